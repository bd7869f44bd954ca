use std::sync::Arc;

use anyhow::{Context, Result};
use payment_intake::{
    build_router,
    config::{AppConfig, MailConfig},
    mailer::SmtpMailer,
    proof::ProofLimits,
    repository::{PaymentRepository, PgPaymentRepository},
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load application configuration")?;
    let mail_config = MailConfig::from_env().context("failed to load mail configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let repository = Arc::new(PgPaymentRepository::new(pool));
    repository
        .init()
        .await
        .context("failed to initialize payments schema")?;

    let mailer = SmtpMailer::from_config(&mail_config).context("failed to configure SMTP")?;
    info!(
        smtp_server = %mail_config.smtp_server,
        smtp_port = mail_config.smtp_port,
        recipients = mail_config.recipients.len(),
        "mailer configured"
    );

    let state = AppState::new(repository, Arc::new(mailer)).with_limits(ProofLimits {
        max_bytes: config.max_upload_bytes,
        max_width: config.proof_max_width,
    });
    let app = build_router(state);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "payment intake started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "payment_intake=debug,tower_http=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

async fn shutdown_signal() {
    let signal = tokio::select! {
        _ = ctrl_c() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };
    info!(signal, "draining in-flight submissions before exit");
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut stream) = signal(SignalKind::terminate()).inspect_err(|err| {
        error!(error = %err, "SIGTERM handler unavailable");
    }) else {
        return std::future::pending().await;
    };
    stream.recv().await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
