use crate::config::PushoverConfig;
use crate::error::{Result, check_status};
use crate::invoice::{NormalizedInvoice, NormalizedInvoiceDetail, iso_timestamp};
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use urlencoding::encode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Summary of one newly created invoice and its line items.
pub fn compose_notification(
    invoice: &NormalizedInvoice,
    details: &[NormalizedInvoiceDetail],
) -> Notification {
    let timestamp = iso_timestamp::format(&invoice.timestamp)
        .unwrap_or_else(|_| invoice.timestamp.to_string());
    let currency = invoice.currency.as_deref().unwrap_or("TWD");

    let mut message = format!(
        "🏪 {}\n🕒 {}\n💰 {}${}\n\n",
        invoice.seller_name, timestamp, currency, invoice.amount
    );
    for detail in details {
        message.push_str(&format!(
            "- {}: ${} × {}\n",
            detail.description, detail.unit_price, detail.quantity
        ));
    }

    Notification {
        title: format!("🧾 {}", invoice.number),
        message,
    }
}

/// Delivers notifications through the Pushover message API.
pub struct PushoverNotifier {
    client: Client,
    config: PushoverConfig,
}

impl PushoverNotifier {
    pub fn new(client: Client, config: &PushoverConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    fn form_body(&self, notification: &Notification) -> String {
        format!(
            "token={}&user={}&title={}&message={}",
            encode(&self.config.api_key),
            encode(&self.config.user_key),
            encode(&notification.title),
            encode(&notification.message),
        )
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/1/messages.json", self.config.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(self.form_body(notification))
            .send()
            .await?;
        check_status(resp).await?;

        info!(title = %notification.title, "Notification sent");
        Ok(())
    }
}
