use std::sync::Arc;

use crate::{mailer::Mailer, proof::ProofLimits, repository::PaymentRepository};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PaymentRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub limits: ProofLimits,
}

impl AppState {
    pub fn new(repo: Arc<dyn PaymentRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            repo,
            mailer,
            limits: ProofLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ProofLimits) -> Self {
        self.limits = limits;
        self
    }
}
