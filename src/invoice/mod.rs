// src/invoice/mod.rs

mod normalize;

pub use normalize::{normalize_detail, normalize_invoice};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::PrimitiveDateTime;

/// Internal name -> provider name, in upload order.
#[cfg(test)]
pub const FIELD_MAPPING: [(&str, &str); 13] = [
    ("number", "invNum"),
    ("card_type", "cardType"),
    ("card_number", "cardNo"),
    ("seller_name", "sellerName"),
    ("status", "invStatus"),
    ("donatable", "invDonatable"),
    ("amount", "amount"),
    ("period", "invPeriod"),
    ("donate_mark", "donateMark"),
    ("seller_tax_id", "sellerBan"),
    ("seller_address", "sellerAddress"),
    ("buyer_tax_id", "buyerBan"),
    ("currency", "currency"),
];

#[cfg(test)]
pub const DETAIL_FIELD_MAPPING: [(&str, &str); 5] = [
    ("row_number", "rowNum"),
    ("description", "description"),
    ("quantity", "quantity"),
    ("unit_price", "unitPrice"),
    ("amount", "amount"),
];

/// Date as the provider sends it: Minguo year, month, day-of-month.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvDate {
    pub year: i32,
    pub month: u8,
    pub date: u8,
}

/// A carrier invoice header as returned by the e-invoice API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvoice {
    pub inv_num: String,
    pub card_type: String,
    pub card_no: String,
    pub seller_name: String,
    pub inv_status: String,
    pub inv_donatable: bool,
    #[serde(deserialize_with = "text_or_number")]
    pub amount: String,
    pub inv_period: String,
    pub donate_mark: i64,
    pub seller_ban: String,
    #[serde(default)]
    pub seller_address: Option<String>,
    #[serde(default)]
    pub buyer_ban: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    pub inv_date: InvDate,
    pub invoice_time: String,
}

/// One line item of a carrier invoice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvoiceDetail {
    #[serde(deserialize_with = "text_or_number")]
    pub row_num: String,
    pub description: String,
    #[serde(deserialize_with = "text_or_number")]
    pub quantity: String,
    #[serde(deserialize_with = "text_or_number")]
    pub unit_price: String,
    #[serde(deserialize_with = "text_or_number")]
    pub amount: String,
}

/// Invoice in the backend's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInvoice {
    pub number: String,
    pub card_type: String,
    pub card_number: String,
    pub seller_name: String,
    pub status: String,
    pub donatable: bool,
    #[serde(deserialize_with = "text_or_number")]
    pub amount: String,
    pub period: String,
    #[serde(with = "donate_mark")]
    pub donate_mark: bool,
    pub seller_tax_id: String,
    #[serde(default)]
    pub seller_address: Option<String>,
    #[serde(default)]
    pub buyer_tax_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(with = "iso_timestamp")]
    pub timestamp: PrimitiveDateTime,
}

/// Line item in the backend's schema. Values stay textual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInvoiceDetail {
    pub row_number: String,
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
}

/// Backend answer to a batch upload. Updated records are only counted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub created: Vec<NormalizedInvoice>,
    #[serde(default)]
    pub updated: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<TextOrNumber> for String {
    fn from(v: TextOrNumber) -> Self {
        match v {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Int(i) => i.to_string(),
            TextOrNumber::Float(f) => f.to_string(),
        }
    }
}

/// The provider is inconsistent about quoting numeric fields.
pub(crate) fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    TextOrNumber::deserialize(deserializer).map(String::from)
}

/// `YYYY-MM-DDTHH:MM:SS`, no offset. A trailing offset on input is dropped.
pub mod iso_timestamp {
    use super::*;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use time::format_description::BorrowedFormatItem;
    use time::macros::format_description;

    const WRITE: &[BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    const READ: &[BorrowedFormatItem<'static>] = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );

    pub fn format(ts: &PrimitiveDateTime) -> Result<String, time::error::Format> {
        ts.format(WRITE)
    }

    pub fn serialize<S: Serializer>(ts: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        let text = format(ts).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PrimitiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        PrimitiveDateTime::parse(strip_offset(&text), READ)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {text:?}: {e}")))
    }

    fn strip_offset(text: &str) -> &str {
        let Some(t) = text.find('T') else {
            return text;
        };
        match text[t..].find(['Z', 'z', '+', '-']) {
            Some(i) => &text[..t + i],
            None => text,
        }
    }
}

/// Sent to the backend as the integer 0/1.
mod donate_mark {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mark {
        Flag(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(mark: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*mark))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Mark::deserialize(d)? {
            Mark::Flag(b) => Ok(b),
            Mark::Int(0) => Ok(false),
            Mark::Int(1) => Ok(true),
            Mark::Int(other) => Err(D::Error::custom(format!(
                "donate_mark must be 0 or 1, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use time::macros::datetime;

    fn sample() -> NormalizedInvoice {
        NormalizedInvoice {
            number: "AB12345678".to_string(),
            card_type: "3J0002".to_string(),
            card_number: "/ABC+123".to_string(),
            seller_name: "全家便利商店".to_string(),
            status: "已確認".to_string(),
            donatable: false,
            amount: "85".to_string(),
            period: "11306".to_string(),
            donate_mark: true,
            seller_tax_id: "16606102".to_string(),
            seller_address: None,
            buyer_tax_id: Some("12345678".to_string()),
            currency: Some("TWD".to_string()),
            timestamp: datetime!(2024-05-20 14:30:00),
        }
    }

    #[test]
    fn test_upload_payload_uses_internal_names() {
        let payload = serde_json::to_value(sample()).unwrap();
        let obj = payload.as_object().unwrap();

        for (internal, _) in FIELD_MAPPING {
            assert!(obj.contains_key(internal), "missing {internal}");
        }
        assert_eq!(obj.len(), FIELD_MAPPING.len() + 1);
        assert_eq!(payload["timestamp"], "2024-05-20T14:30:00");
        assert_eq!(payload["donate_mark"], 1);
        assert_eq!(payload["seller_address"], Value::Null);
    }

    #[test]
    fn test_payload_reads_back_unchanged() {
        let invoice = sample();
        let text = serde_json::to_string(&invoice).unwrap();
        let back: NormalizedInvoice = serde_json::from_str(&text).unwrap();
        assert_eq!(back, invoice);

        let again = serde_json::to_value(&back).unwrap();
        assert_eq!(again["timestamp"], "2024-05-20T14:30:00");
    }

    #[test]
    fn test_backend_timestamp_with_fraction() {
        let mut payload = serde_json::to_value(sample()).unwrap();
        payload["timestamp"] = json!("2024-05-20T14:30:00.000000");
        payload["id"] = json!(42);
        let parsed: NormalizedInvoice = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.timestamp, datetime!(2024-05-20 14:30:00));
    }

    #[test]
    fn test_backend_timestamp_offset_is_dropped() {
        for stamp in ["2024-05-20T14:30:00+08:00", "2024-05-20T14:30:00Z", "2024-05-20T14:30:00.5-03:00"] {
            let mut payload = serde_json::to_value(sample()).unwrap();
            payload["timestamp"] = json!(stamp);
            let parsed: NormalizedInvoice = serde_json::from_value(payload).unwrap();
            assert_eq!(parsed.timestamp.date(), time::macros::date!(2024-05-20));
            assert_eq!(parsed.timestamp.hour(), 14);
            assert_eq!(parsed.timestamp.minute(), 30);
        }
    }

    #[test]
    fn test_upload_result_tolerates_backend_echo() {
        let mut created = serde_json::to_value(sample()).unwrap();
        created["amount"] = json!(85);
        created["timestamp"] = json!("2024-05-20T14:30:00+08:00");
        let updated = json!({"number": "AB00000009", "timestamp": "2024-05-01T09:00:00+08:00", "amount": 30});

        let result: UploadResult =
            serde_json::from_value(json!({"created": [created], "updated": [updated]})).unwrap();

        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].amount, "85");
        assert_eq!(result.created[0].timestamp, datetime!(2024-05-20 14:30:00));
        assert_eq!(result.updated.len(), 1);
    }

    #[test]
    fn test_donate_mark_rejects_other_values() {
        let mut payload = serde_json::to_value(sample()).unwrap();
        payload["donate_mark"] = json!(2);
        assert!(serde_json::from_value::<NormalizedInvoice>(payload.clone()).is_err());

        payload["donate_mark"] = json!(0);
        let parsed: NormalizedInvoice = serde_json::from_value(payload).unwrap();
        assert!(!parsed.donate_mark);
    }

    #[test]
    fn test_raw_detail_accepts_numbers() {
        let detail: RawInvoiceDetail = serde_json::from_value(json!({
            "rowNum": 1,
            "description": "拿鐵",
            "quantity": "2",
            "unitPrice": 65,
            "amount": 130.5
        }))
        .unwrap();
        assert_eq!(detail.row_num, "1");
        assert_eq!(detail.unit_price, "65");
        assert_eq!(detail.amount, "130.5");
    }

    #[test]
    fn test_upload_result_defaults_to_empty() {
        let result: UploadResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.created.is_empty());
        assert!(result.updated.is_empty());
    }
}
