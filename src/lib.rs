// ============================================================================
// Payment intake service
// ============================================================================

//! Accepts payment confirmations posted from a web form, keeps them in
//! PostgreSQL, mails the processed proof of payment to an operator and
//! exports every stored confirmation as a spreadsheet.
//!
//! ```text
//! POST /sendemail         multipart form + `comprobante_pago` file
//! GET  /descargarreporte  xlsx export of all payments
//! GET  /health            liveness check
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod proof;
pub mod report;
pub mod repository;
pub mod state;
pub mod validation;

pub use app::build_router;
pub use error::{AppError, AppResult};
