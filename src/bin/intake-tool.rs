use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use payment_intake::{
    config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROOF_MAX_WIDTH},
    proof::{ProofLimits, ProofUpload, process_proof},
    report::{FILE_NAME, write_report},
    repository::{PaymentRepository, PgPaymentRepository},
};
use sqlx::postgres::PgPoolOptions;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "intake-tool")]
#[command(about = "Operator tooling for the payment intake service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write every stored payment to an xlsx file.
    Export {
        #[arg(long, default_value = FILE_NAME)]
        out: PathBuf,
    },
    /// Run a proof-of-payment file through the upload pipeline.
    InspectProof {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_PROOF_MAX_WIDTH)]
        max_width: u32,
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_bytes: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Export { out } => export(&out).await,
        Command::InspectProof {
            file,
            out,
            max_width,
            max_bytes,
        } => inspect_proof(
            &file,
            out.as_deref(),
            ProofLimits {
                max_bytes,
                max_width,
            },
        ),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory '{}'", parent.display()))?;
    }
    Ok(())
}

async fn export(out: &Path) -> Result<()> {
    let config = AppConfig::from_env().context("failed to read configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let payments = PgPaymentRepository::new(pool)
        .list_all()
        .await
        .context("failed to load payments")?;

    ensure_parent_dir(out)?;
    write_report(out, &payments)
        .with_context(|| format!("Failed to write report to '{}'", out.display()))?;

    println!("Exported {} payments to {}", payments.len(), out.display());
    Ok(())
}

fn inspect_proof(file: &Path, out: Option<&Path>, limits: ProofLimits) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read '{}'", file.display()))?;
    let input_size = bytes.len();

    let upload = ProofUpload {
        file_name: file.file_name().map(|name| name.to_string_lossy().into_owned()),
        bytes,
    };
    let processed = process_proof(upload, limits).map_err(|err| anyhow!("Proof rejected: {err}"))?;

    println!(
        "{} -> {} ({:?} -> {:?}, {} -> {} bytes)",
        file.display(),
        processed.file_name,
        processed.source_kind,
        processed.kind,
        input_size,
        processed.bytes.len()
    );

    if let Some(out) = out {
        ensure_parent_dir(out)?;
        fs::write(out, &processed.bytes)
            .with_context(|| format!("Failed to write processed proof to '{}'", out.display()))?;
        println!("Wrote processed proof: {}", out.display());
    }

    Ok(())
}
