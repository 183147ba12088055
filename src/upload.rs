use crate::auth::{self, BearerToken};
use crate::config::UploadConfig;
use crate::error::{Error, Result, check_status};
use crate::invoice::{NormalizedInvoice, NormalizedInvoiceDetail, UploadResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use urlencoding::encode;

/// The private backend that stores invoices and decides created vs. updated.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    async fn authenticate(&mut self) -> Result<()>;

    async fn upload_invoices(&self, invoices: &[NormalizedInvoice]) -> Result<UploadResult>;

    async fn upload_details(
        &self,
        invoice_number: &str,
        details: &[NormalizedInvoiceDetail],
    ) -> Result<serde_json::Value>;
}

pub struct UploadClient {
    client: Client,
    config: UploadConfig,
    token: Option<BearerToken>,
}

impl UploadClient {
    pub fn new(client: Client, config: &UploadConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            token: None,
        }
    }

    fn token(&self) -> Result<&BearerToken> {
        self.token.as_ref().ok_or_else(|| Error::Authentication {
            status: 0,
            body: "upload attempted before authentication".to_string(),
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let token = self.token()?;
        let resp = self
            .client
            .post(url)
            .header("Authorization", token.header_value())
            .json(body)
            .send()
            .await?;
        check_status(resp).await
    }
}

pub fn invoice_detail_url(host: &str, invoice_number: &str) -> String {
    format!("{host}/tw-invoice/{}", encode(invoice_number))
}

#[async_trait]
impl UploadBackend for UploadClient {
    async fn authenticate(&mut self) -> Result<()> {
        let token = auth::request_token(
            &self.client,
            &self.config.host,
            &self.config.username,
            &self.config.password,
        )
        .await?;
        self.token = Some(token);
        Ok(())
    }

    async fn upload_invoices(&self, invoices: &[NormalizedInvoice]) -> Result<UploadResult> {
        let url = format!("{}/tw-invoice", self.config.host);
        info!(count = invoices.len(), "Uploading invoices");

        let resp = self.post_json(&url, invoices).await?;
        let result: UploadResult = resp.json().await?;
        debug!(?result, "Upload result");
        Ok(result)
    }

    async fn upload_details(
        &self,
        invoice_number: &str,
        details: &[NormalizedInvoiceDetail],
    ) -> Result<serde_json::Value> {
        let url = invoice_detail_url(&self.config.host, invoice_number);
        info!(invoice = %invoice_number, count = details.len(), "Uploading invoice details");

        let resp = self.post_json(&url, details).await?;
        let result: serde_json::Value = resp.json().await?;
        debug!(invoice = %invoice_number, %result, "Detail upload result");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        UploadConfig {
            host: "http://localhost:8000".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn test_detail_url_encodes_number() {
        assert_eq!(
            invoice_detail_url("http://localhost:8000", "AB12345678"),
            "http://localhost:8000/tw-invoice/AB12345678"
        );
        assert_eq!(
            invoice_detail_url("http://h", "AB 1/2"),
            "http://h/tw-invoice/AB%201%2F2"
        );
    }

    #[tokio::test]
    async fn test_upload_requires_token() {
        let client = UploadClient::new(Client::new(), &config());
        let err = client.upload_invoices(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Authentication { status: 0, .. }));
    }
}
