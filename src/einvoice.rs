use crate::config::{CardConfig, ProviderConfig};
use crate::error::{Error, Result, check_status};
use crate::invoice::{RawInvoice, RawInvoiceDetail, text_or_number};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::BTreeMap;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};
use urlencoding::encode;

const API_PATH: &str = "/PB2CAPIVAN/invServ/InvServ";
const API_VERSION: &str = "0.5";
const SUCCESS_CODE: &str = "200";

/// Source of carrier invoices.
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn fetch_invoices(&self, start: Date, end: Date) -> Result<Vec<RawInvoice>>;

    async fn fetch_details(
        &self,
        invoice_number: &str,
        invoice_date: Date,
    ) -> Result<Vec<RawInvoiceDetail>>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(deserialize_with = "text_or_number")]
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    details: Vec<T>,
}

/// Client for the Ministry of Finance e-invoice app API, scoped to one carrier card.
pub struct EinvoiceClient {
    client: Client,
    provider: ProviderConfig,
    card: CardConfig,
}

impl EinvoiceClient {
    pub fn new(client: Client, provider: &ProviderConfig, card: &CardConfig) -> Self {
        Self {
            client,
            provider: provider.clone(),
            card: card.clone(),
        }
    }

    /// Parameters every carrier call carries, including the replay-window timestamps.
    fn base_params(&self, action: &str, now: i64) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("version", API_VERSION.to_string()),
            ("action", action.to_string()),
            ("cardType", self.card.card_type.clone()),
            ("cardNo", self.card.card_number.clone()),
            ("cardEncrypt", self.card.card_encrypt.clone()),
            ("appID", self.provider.app_id.clone()),
            ("uuid", uuid::Uuid::new_v4().to_string()),
            ("timeStamp", (now + 10).to_string()),
            ("expTimeStamp", (now + self.provider.ts_tolerance).to_string()),
        ])
    }

    async fn call<T: DeserializeOwned>(
        &self,
        params: BTreeMap<&'static str, String>,
    ) -> Result<Vec<T>> {
        let url = format!("{}{API_PATH}", self.provider.base_url);
        let body = signed_body(&params, &self.provider.api_key)?;

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let text = resp.text().await?;
        debug!(len = text.len(), body = %text, "Provider response");
        parse_response(&text)
    }
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Dates travel as `YYYY/MM/DD`.
pub fn format_api_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]/[month]/[day]"))
        .map_err(|e| Error::Validation(format!("cannot format date {date}: {e}")))
}

/// HMAC-SHA256 over the name-sorted `k=v&...` string, base64 encoded.
pub fn sign(params: &BTreeMap<&'static str, String>, api_key: &str) -> Result<String> {
    let canonical = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = Hmac::<Sha256>::new_from_slice(api_key.as_bytes())
        .map_err(|e| Error::Config(format!("invalid api key: {e}")))?;
    mac.update(canonical.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn signed_body(params: &BTreeMap<&'static str, String>, api_key: &str) -> Result<String> {
    let signature = sign(params, api_key)?;
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}={}", encode(v)))
        .collect();
    pairs.push(format!("signature={}", encode(&signature)));
    Ok(pairs.join("&"))
}

fn parse_response<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let resp: ApiResponse<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| Error::Validation(format!("malformed provider response: {e}")))?;

    if resp.code != SUCCESS_CODE {
        return Err(Error::Provider {
            code: resp.code,
            message: resp.msg,
        });
    }

    resp.details
        .into_iter()
        .map(|record| {
            serde_json::from_value(record)
                .map_err(|e| Error::Validation(format!("malformed provider record: {e}")))
        })
        .collect()
}

#[async_trait]
impl InvoiceProvider for EinvoiceClient {
    async fn fetch_invoices(&self, start: Date, end: Date) -> Result<Vec<RawInvoice>> {
        let mut params = self.base_params("carrierInvChk", unix_now());
        params.insert("startDate", format_api_date(start)?);
        params.insert("endDate", format_api_date(end)?);
        params.insert("onlyWinningInv", "N".to_string());

        let invoices: Vec<RawInvoice> = self.call(params).await?;
        info!(count = invoices.len(), %start, %end, "Fetched invoices");
        Ok(invoices)
    }

    async fn fetch_details(
        &self,
        invoice_number: &str,
        invoice_date: Date,
    ) -> Result<Vec<RawInvoiceDetail>> {
        let mut params = self.base_params("carrierInvDetail", unix_now());
        params.insert("invNum", invoice_number.to_string());
        params.insert("invDate", format_api_date(invoice_date)?);

        let details: Vec<RawInvoiceDetail> = self.call(params).await?;
        info!(invoice = %invoice_number, count = details.len(), "Fetched details");
        Ok(details)
    }
}
