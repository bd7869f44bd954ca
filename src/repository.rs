use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{NewPayment, Payment},
};

const UNIQUE_VIOLATION: &str = "23505";

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn init(&self) -> AppResult<()>;
    async fn exists(&self, operation_type: &str, operation_number: &str) -> AppResult<bool>;
    /// Fails with [`AppError::DuplicateOperation`] when the operation is already stored.
    async fn insert(&self, payment: NewPayment) -> AppResult<Payment>;
    async fn list_all(&self) -> AppResult<Vec<Payment>>;
}

#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn init(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn exists(&self, operation_type: &str, operation_number: &str) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payments
                WHERE operation_type = $1 AND operation_number = $2
            )
            "#,
        )
        .bind(operation_type)
        .bind(operation_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert(&self, payment: NewPayment) -> AppResult<Payment> {
        let form = payment.form;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                first_names, last_names, email, phone, university, ticket,
                student_code, major, operation_type, operation_number, national_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING
                id,
                first_names,
                last_names,
                email,
                phone,
                university,
                ticket,
                student_code,
                major,
                operation_type,
                operation_number,
                national_id,
                registered_at
            "#,
        )
        .bind(form.first_names)
        .bind(form.last_names)
        .bind(form.email)
        .bind(form.phone)
        .bind(form.university)
        .bind(form.ticket)
        .bind(form.student_code)
        .bind(form.major)
        .bind(form.operation_type)
        .bind(form.operation_number)
        .bind(form.national_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::DuplicateOperation
            } else {
                AppError::Database(err)
            }
        })?;

        Ok(payment)
    }

    async fn list_all(&self) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id,
                first_names,
                last_names,
                email,
                phone,
                university,
                ticket,
                student_code,
                major,
                operation_type,
                operation_number,
                national_id,
                registered_at
            FROM payments
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: RwLock<Vec<Payment>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn init(&self) -> AppResult<()> {
        Ok(())
    }

    async fn exists(&self, operation_type: &str, operation_number: &str) -> AppResult<bool> {
        Ok(self.payments.read().await.iter().any(|payment| {
            payment.operation_type == operation_type && payment.operation_number == operation_number
        }))
    }

    async fn insert(&self, payment: NewPayment) -> AppResult<Payment> {
        let mut payments = self.payments.write().await;

        let duplicate = payments.iter().any(|stored| {
            stored.operation_type == payment.form.operation_type
                && stored.operation_number == payment.form.operation_number
        });
        if duplicate {
            return Err(AppError::DuplicateOperation);
        }

        let id = i32::try_from(payments.len() + 1)
            .map_err(|_| AppError::internal("in-memory payment ids exhausted"))?;
        let stored = Payment::from_new(id, payment, Utc::now());
        payments.push(stored.clone());

        Ok(stored)
    }

    async fn list_all(&self) -> AppResult<Vec<Payment>> {
        Ok(self.payments.read().await.clone())
    }
}
