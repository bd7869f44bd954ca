use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    mailer::PaymentNotification,
    models::{ApiMessage, ApiResponse, FormField, NewPayment, PROOF_FIELD, PaymentForm},
    proof::{ProofUpload, process_proof_blocking},
    report,
    state::AppState,
    validation::validate_form,
};

pub async fn healthcheck() -> Json<ApiResponse<ApiMessage>> {
    Json(ApiResponse {
        data: ApiMessage {
            message: "ok".to_string(),
        },
    })
}

pub async fn submit_payment(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiMessage>> {
    let multipart = multipart.map_err(|rejection| AppError::malformed(rejection.body_text()))?;
    let Submission { form, proof } = read_submission(multipart, state.limits.max_bytes).await?;

    validate_form(&form)?;

    if state
        .repo
        .exists(&form.operation_type, &form.operation_number)
        .await?
    {
        warn!(
            operation_type = %form.operation_type,
            operation_number = %form.operation_number,
            "operation already registered"
        );
        return Err(AppError::DuplicateOperation);
    }

    let upload = proof.ok_or(AppError::MissingProof)?;
    let proof = process_proof_blocking(upload, state.limits).await?;

    let payment = state.repo.insert(NewPayment::from(form)).await?;
    info!(
        payment_id = payment.id,
        operation_type = %payment.operation_type,
        operation_number = %payment.operation_number,
        proof_kind = ?proof.kind,
        proof_bytes = proof.bytes.len(),
        "payment registered"
    );

    let notification = PaymentNotification { payment, proof };
    if let Err(err) = state.mailer.send(&notification).await {
        error!(
            payment_id = notification.payment.id,
            error = %err,
            "failed to send payment notification"
        );
        return Err(AppError::Email(err.to_string()));
    }

    Ok(Json(ApiMessage {
        message: "Form submitted successfully".to_string(),
    }))
}

pub async fn download_report(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let payments = state.repo.list_all().await?;
    let rows = payments.len();

    let bytes = tokio::task::spawn_blocking(move || report::build_report(&payments))
        .await
        .map_err(|err| AppError::internal(format!("report worker failed: {err}")))?
        .map_err(|err| AppError::Report(err.to_string()))?;

    info!(rows, bytes = bytes.len(), "payment report generated");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, report::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report::FILE_NAME),
            ),
        ],
        bytes,
    ))
}

#[derive(Debug, Default)]
pub struct Submission {
    pub form: PaymentForm,
    pub proof: Option<ProofUpload>,
}

/// Drains the multipart body. Unknown parts are skipped.
pub async fn read_submission(mut multipart: Multipart, max_bytes: usize) -> AppResult<Submission> {
    let mut submission = Submission::default();
    let to_app_error = |err: MultipartError| multipart_error(err, max_bytes);

    while let Some(field) = multipart.next_field().await.map_err(to_app_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PROOF_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(to_app_error)?;
            // Browsers post an empty part when no file was picked.
            if !bytes.is_empty() {
                submission.proof = Some(ProofUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else if let Some(form_field) = FormField::from_wire_name(&name) {
            let value = field.text().await.map_err(to_app_error)?;
            submission.form.set(form_field, &value);
        }
    }

    Ok(submission)
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge { limit: max_bytes }
    } else {
        AppError::malformed(err.body_text())
    }
}
