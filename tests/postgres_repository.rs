use payment_intake::{
    AppError,
    models::{NewPayment, PaymentForm},
    repository::{PaymentRepository, PgPaymentRepository},
};
use sqlx::{PgPool, postgres::PgPoolOptions};

async fn maybe_pool() -> Option<PgPool> {
    // Never DATABASE_URL: the test truncates the table.
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .ok()
}

fn payment(operation_type: &str, operation_number: &str) -> NewPayment {
    NewPayment::from(PaymentForm {
        first_names: "Elena".to_string(),
        last_names: "Torres".to_string(),
        email: "elena.torres@example.com".to_string(),
        phone: "987000111".to_string(),
        university: "UNMSM".to_string(),
        ticket: "general".to_string(),
        student_code: String::new(),
        major: "Systems Engineering".to_string(),
        operation_type: operation_type.to_string(),
        operation_number: operation_number.to_string(),
        national_id: "40011223".to_string(),
    })
}

#[tokio::test]
async fn postgres_repository_flow() {
    let Some(pool) = maybe_pool().await else {
        eprintln!(
            "Skipping postgres_repository_flow: TEST_DATABASE_URL is not set or database is unreachable."
        );
        return;
    };

    let repo = PgPaymentRepository::new(pool.clone());
    repo.init().await.expect("migrations should run");

    sqlx::query("TRUNCATE TABLE payments RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("truncate should succeed");

    assert!(!repo.exists("transfer", "A-1").await.expect("exists should succeed"));

    let stored = repo
        .insert(payment("transfer", "A-1"))
        .await
        .expect("insert should succeed");
    assert_eq!(stored.id, 1);
    assert_eq!(stored.first_names, "Elena");

    assert!(repo.exists("transfer", "A-1").await.expect("exists should succeed"));
    assert!(!repo.exists("deposit", "A-1").await.expect("exists should succeed"));

    let err = repo
        .insert(payment("transfer", "A-1"))
        .await
        .expect_err("duplicate insert should fail");
    assert!(matches!(err, AppError::DuplicateOperation));

    repo.insert(payment("deposit", "A-1"))
        .await
        .expect("same number on another channel should insert");

    let all = repo.list_all().await.expect("list should succeed");
    assert_eq!(all.len(), 2);
    assert!(all[0].id < all[1].id);
}
