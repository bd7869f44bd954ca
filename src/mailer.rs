use std::fmt::Write as _;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    config::{MailConfig, SmtpTls},
    models::Payment,
    proof::ProcessedProof,
};

pub const SUBJECT: &str = "New payment registered";

#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub payment: Payment,
    pub proof: ProcessedProof,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("invalid attachment content type: {0}")]
    ContentType(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &PaymentNotification) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let builder = match config.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)?,
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
            }
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
            }
        };

        let mut builder = builder.port(config.smtp_port);
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&config.from)?,
            to: config
                .recipients
                .iter()
                .map(|address| parse_mailbox(address))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &PaymentNotification) -> Result<(), MailError> {
        let message = compose_message(&self.from, &self.to, notification)?;
        let response = self.transport.send(message).await?;

        info!(
            payment_id = notification.payment.id,
            recipients = self.to.len(),
            code = %response.code(),
            "payment notification sent"
        );
        Ok(())
    }
}

/// Keeps every notification in memory instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<PaymentNotification>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<PaymentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, notification: &PaymentNotification) -> Result<(), MailError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

pub fn compose_message(
    from: &Mailbox,
    to: &[Mailbox],
    notification: &PaymentNotification,
) -> Result<Message, MailError> {
    let proof = &notification.proof;
    let content_type = ContentType::parse(proof.content_type())
        .map_err(|err| MailError::ContentType(err.to_string()))?;

    let mut builder = Message::builder().from(from.clone()).subject(SUBJECT);
    for recipient in to {
        builder = builder.to(recipient.clone());
    }

    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::html(render_body(&notification.payment)))
            .singlepart(Attachment::new(proof.file_name.clone()).body(proof.bytes.clone(), content_type)),
    )?;

    Ok(message)
}

pub fn render_body(payment: &Payment) -> String {
    let mut body = String::from("<p>A new payment has been registered.</p>\n<p>\n");
    for (label, value) in payment.labelled_fields() {
        let _ = writeln!(body, "{label}: {}<br>", escape_html(value));
    }
    let _ = writeln!(
        body,
        "Registered at: {} UTC<br>\n</p>",
        payment.registered_at.format("%Y-%m-%d %H:%M:%S")
    );
    body
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::ProofKind;
    use chrono::{TimeZone, Utc};

    fn notification() -> PaymentNotification {
        PaymentNotification {
            payment: Payment {
                id: 7,
                first_names: "Rosa <b>".to_string(),
                last_names: "Condori & Hijos".to_string(),
                email: "rosa@example.com".to_string(),
                phone: "955555555".to_string(),
                university: "UNSAAC".to_string(),
                ticket: "professional".to_string(),
                student_code: String::new(),
                major: "Electrical Engineering".to_string(),
                operation_type: "deposit".to_string(),
                operation_number: "88442211".to_string(),
                national_id: "41234567".to_string(),
                registered_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            },
            proof: ProcessedProof {
                file_name: "voucher.pdf".to_string(),
                source_kind: ProofKind::Pdf,
                kind: ProofKind::Pdf,
                bytes: b"%PDF-1.4\n%%EOF\n".to_vec(),
            },
        }
    }

    #[test]
    fn body_lists_fields_escaped() {
        let body = render_body(&notification().payment);

        assert!(body.contains("First names: Rosa &lt;b&gt;<br>"));
        assert!(body.contains("Last names: Condori &amp; Hijos<br>"));
        assert!(body.contains("Operation number: 88442211<br>"));
        assert!(body.contains("Registered at: 2026-03-14 09:30:00 UTC"));
    }

    #[test]
    fn message_carries_subject_recipients_and_attachment() {
        let from = parse_mailbox("Payments <payments@example.com>").unwrap();
        let to = vec![
            parse_mailbox("ops@example.com").unwrap(),
            parse_mailbox("treasurer@example.com").unwrap(),
        ];

        let message = compose_message(&from, &to, &notification()).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("Subject: New payment registered"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("treasurer@example.com"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("voucher.pdf"));
    }

    #[test]
    fn rejects_invalid_address() {
        let err = parse_mailbox("not an address").unwrap_err();
        assert!(matches!(err, MailError::Address { .. }));
    }

    #[tokio::test]
    async fn recording_mailer_keeps_notifications() {
        let mailer = RecordingMailer::new();
        mailer.send(&notification()).await.unwrap();

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payment.operation_number, "88442211");
    }
}
