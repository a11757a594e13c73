//! Vetting panel state: the DOT form and the last report it fetched.

use super::client::{normalize_dot, VettingClient, VettingReport};
use crate::auth::{AuthRecord, AuthStore};
use std::sync::Arc;

/// Alert shown when a lookup is attempted without a session.
pub const LOGIN_REQUIRED_ALERT: &str = "Please log in to vet carriers.";

/// What a [`VettingPanel::submit`] ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Loaded,
    Alerted,
}

pub struct VettingPanel {
    client: Arc<VettingClient>,
    store: Arc<dyn AuthStore>,
    dot_input: String,
    loading: bool,
    carrier_data: Option<VettingReport>,
    alert: Option<String>,
}

impl VettingPanel {
    pub fn new(client: Arc<VettingClient>, store: Arc<dyn AuthStore>) -> Self {
        Self {
            client,
            store,
            dot_input: String::new(),
            loading: false,
            carrier_data: None,
            alert: None,
        }
    }

    pub fn set_dot_input(&mut self, value: impl Into<String>) {
        self.dot_input = value.into();
    }

    pub fn dot_input(&self) -> &str {
        &self.dot_input
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn carrier_data(&self) -> Option<&VettingReport> {
        self.carrier_data.as_ref()
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Look up the DOT number currently in the form.
    ///
    /// Success replaces the shown report. Any failure only raises an alert;
    /// the previously shown report (if any) stays as it was.
    pub async fn submit(&mut self) -> SubmitOutcome {
        self.alert = None;

        if let Err(e) = normalize_dot(&self.dot_input) {
            return self.raise(e.alert_message());
        }

        let record = match AuthRecord::load(self.store.as_ref()).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to read auth state before vetting: {e:#}");
                return self.raise(LOGIN_REQUIRED_ALERT.to_string());
            }
        };
        if !record.is_logged_in() {
            return self.raise(LOGIN_REQUIRED_ALERT.to_string());
        }

        self.loading = true;
        let result = self
            .client
            .vet(&self.dot_input, record.token.as_deref())
            .await;
        self.loading = false;

        match result {
            Ok(report) => {
                tracing::info!(dot = %report.dot_number, "Carrier report loaded");
                self.carrier_data = Some(report);
                SubmitOutcome::Loaded
            }
            Err(e) => {
                tracing::warn!("Vetting failed: {e}");
                self.raise(e.alert_message())
            }
        }
    }

    fn raise(&mut self, message: String) -> SubmitOutcome {
        self.alert = Some(message);
        SubmitOutcome::Alerted
    }
}
