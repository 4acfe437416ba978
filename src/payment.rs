//! Invoice payment collaborators.
//!
//! Payment is fire-and-forget: [`InvoicePayer::pay_invoice`] returns
//! immediately and the outcome never reaches the HTTP caller.

use std::sync::Arc;
use std::time::Duration;

use crate::config::PaymentConfig;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

pub trait InvoicePayer: Send + Sync {
    /// Start paying `invoice` without waiting for the result.
    fn pay_invoice(&self, invoice: String);
}

/// Payer used when no wallet is configured: records the invoice in the log only.
pub struct LoggingInvoicePayer;

impl InvoicePayer for LoggingInvoicePayer {
    fn pay_invoice(&self, invoice: String) {
        tracing::warn!(%invoice, "no payment collaborator configured, invoice left unpaid");
    }
}

/// POSTs `{"invoice": "..."}` to an external wallet service.
pub struct WebhookInvoicePayer {
    client: reqwest::Client,
    url: Arc<str>,
}

impl WebhookInvoicePayer {
    #[must_use]
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("failed to build payment webhook client, using defaults: {err}");
                reqwest::Client::new()
            });
        Self {
            client,
            url: Arc::from(url),
        }
    }
}

impl InvoicePayer for WebhookInvoicePayer {
    fn pay_invoice(&self, invoice: String) {
        let client = self.client.clone();
        let url = Arc::clone(&self.url);
        tracing::info!(%invoice, "paying invoice");
        tokio::spawn(async move {
            let result = client
                .post(url.as_ref())
                .json(&serde_json::json!({ "invoice": invoice }))
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(%invoice, "payment webhook accepted invoice");
                }
                Ok(response) => {
                    tracing::error!(%invoice, status = %response.status(), "payment webhook refused invoice");
                }
                Err(err) => {
                    tracing::error!(%invoice, "payment webhook failed: {err}");
                }
            }
        });
    }
}

#[must_use]
pub fn build_invoice_payer(config: &PaymentConfig) -> Arc<dyn InvoicePayer> {
    match config.webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookInvoicePayer::new(url)),
        None => Arc::new(LoggingInvoicePayer),
    }
}
