use super::{NormalizedInvoice, NormalizedInvoiceDetail, RawInvoice, RawInvoiceDetail};
use crate::error::{Error, Result};
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime, Time};

/// Minguo year 1 is 1912.
const MINGUO_OFFSET: i32 = 1911;

/// Remap a provider invoice onto the backend schema.
pub fn normalize_invoice(raw: &RawInvoice) -> Result<NormalizedInvoice> {
    let donate_mark = match raw.donate_mark {
        0 => false,
        1 => true,
        other => {
            return Err(Error::Validation(format!(
                "invoice {}: donateMark must be 0 or 1, got {other}",
                raw.inv_num
            )));
        }
    };

    let timestamp = minguo_timestamp(
        raw.inv_date.year,
        raw.inv_date.month,
        raw.inv_date.date,
        &raw.invoice_time,
    )
    .map_err(|e| match e {
        Error::Validation(msg) => Error::Validation(format!("invoice {}: {msg}", raw.inv_num)),
        other => other,
    })?;

    Ok(NormalizedInvoice {
        number: raw.inv_num.clone(),
        card_type: raw.card_type.clone(),
        card_number: raw.card_no.clone(),
        seller_name: raw.seller_name.clone(),
        status: raw.inv_status.clone(),
        donatable: raw.inv_donatable,
        amount: raw.amount.clone(),
        period: raw.inv_period.clone(),
        donate_mark,
        seller_tax_id: raw.seller_ban.clone(),
        seller_address: raw.seller_address.clone(),
        buyer_tax_id: raw.buyer_ban.clone(),
        currency: raw.currency.clone(),
        timestamp,
    })
}

pub fn normalize_detail(raw: &RawInvoiceDetail) -> NormalizedInvoiceDetail {
    NormalizedInvoiceDetail {
        row_number: raw.row_num.clone(),
        description: raw.description.clone(),
        quantity: raw.quantity.clone(),
        unit_price: raw.unit_price.clone(),
        amount: raw.amount.clone(),
    }
}

/// Build a local timestamp from a Minguo date and the provider's time-of-day text.
pub fn minguo_timestamp(
    year: i32,
    month: u8,
    day: u8,
    time_text: &str,
) -> Result<PrimitiveDateTime> {
    let Some(gregorian) = year.checked_add(MINGUO_OFFSET) else {
        return Err(Error::Validation(format!(
            "invalid timestamp: Minguo year {year} out of range"
        )));
    };
    let composed = format!("{gregorian:04}-{month:02}-{day:02}T{time_text}");
    let invalid = |why: &str| Error::Validation(format!("invalid timestamp {composed:?}: {why}"));

    let month = Month::try_from(month).map_err(|_| invalid("month out of range"))?;
    let date = Date::from_calendar_date(gregorian, month, day)
        .map_err(|_| invalid("day out of range for month"))?;
    let time = parse_time_of_day(time_text.trim()).ok_or_else(|| invalid("malformed time"))?;

    Ok(PrimitiveDateTime::new(date, time))
}

// ---------------------------------------------------------------------------
// Time-of-day parsing
// ---------------------------------------------------------------------------

fn parse_time_of_day(text: &str) -> Option<Time> {
    let extended = format_description!("[hour]:[minute]:[second]");
    let basic = format_description!("[hour][minute][second]");
    let short = format_description!("[hour]:[minute]");

    Time::parse(text, extended)
        .or_else(|_| Time::parse(text, basic))
        .or_else(|_| Time::parse(text, short))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{DETAIL_FIELD_MAPPING, FIELD_MAPPING};
    use serde_json::{Value, json};
    use time::macros::datetime;

    fn raw_json() -> Value {
        json!({
            "rowNum": 1,
            "invNum": "AB12345678",
            "cardType": "3J0002",
            "cardNo": "/ABC+123",
            "sellerName": "全家便利商店",
            "invStatus": "已確認",
            "invDonatable": false,
            "amount": "85",
            "invPeriod": "11306",
            "donateMark": 0,
            "sellerBan": "16606102",
            "sellerAddress": "台北市中山區",
            "invoiceTime": "14:30:00",
            "buyerBan": null,
            "currency": "TWD",
            "invDate": {
                "year": 113, "month": 5, "date": 20, "day": 1,
                "hours": 0, "minutes": 0, "seconds": 0,
                "time": 1716134400000i64, "timezoneOffset": -480
            }
        })
    }

    fn raw() -> RawInvoice {
        serde_json::from_value(raw_json()).unwrap()
    }

    #[test]
    fn test_minguo_conversion() {
        let ts = minguo_timestamp(113, 5, 20, "143000").unwrap();
        assert_eq!(ts, datetime!(2024-05-20 14:30:00));

        let ts = minguo_timestamp(113, 5, 20, "14:30:00").unwrap();
        assert_eq!(ts, datetime!(2024-05-20 14:30:00));
    }

    #[test]
    fn test_invalid_dates_are_errors() {
        assert!(matches!(minguo_timestamp(113, 2, 30, "10:00:00"), Err(Error::Validation(_))));
        assert!(matches!(minguo_timestamp(113, 13, 1, "10:00:00"), Err(Error::Validation(_))));
        assert!(matches!(minguo_timestamp(113, 5, 20, "25:00:00"), Err(Error::Validation(_))));
        assert!(matches!(minguo_timestamp(113, 5, 20, "noon"), Err(Error::Validation(_))));
        assert!(matches!(minguo_timestamp(i32::MAX, 5, 20, "14:30:00"), Err(Error::Validation(_))));
        assert!(matches!(minguo_timestamp(9000, 5, 20, "14:30:00"), Err(Error::Validation(_))));
        // 2024 is a leap year
        assert!(minguo_timestamp(113, 2, 29, "00:00:00").is_ok());
    }

    #[test]
    fn test_normalize_invoice_maps_every_field() {
        let raw_value = raw_json();
        let normalized = normalize_invoice(&raw()).unwrap();
        let out = serde_json::to_value(&normalized).unwrap();

        for (internal, provider) in FIELD_MAPPING {
            let expected = match provider {
                "donateMark" => json!(0),
                _ => raw_value[provider].clone(),
            };
            assert_eq!(out[internal], expected, "{internal} <- {provider}");
        }
        assert_eq!(out["timestamp"], "2024-05-20T14:30:00");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = raw();
        assert_eq!(normalize_invoice(&raw).unwrap(), normalize_invoice(&raw).unwrap());
    }

    #[test]
    fn test_donate_mark_coercion() {
        let mut raw = raw();
        raw.donate_mark = 1;
        assert!(normalize_invoice(&raw).unwrap().donate_mark);
        raw.donate_mark = 0;
        assert!(!normalize_invoice(&raw).unwrap().donate_mark);
        raw.donate_mark = 2;
        assert!(matches!(normalize_invoice(&raw), Err(Error::Validation(_))));
    }

    #[test]
    fn test_bad_time_names_invoice() {
        let mut raw = raw();
        raw.invoice_time = "99:99".to_string();
        let err = normalize_invoice(&raw).unwrap_err();
        assert!(err.to_string().contains("AB12345678"));
    }

    #[test]
    fn test_normalize_detail() {
        let raw_value = json!({
            "rowNum": "2",
            "description": "經典美式",
            "quantity": "1",
            "unitPrice": "45",
            "amount": "45"
        });
        let raw: RawInvoiceDetail = serde_json::from_value(raw_value.clone()).unwrap();
        let out = serde_json::to_value(normalize_detail(&raw)).unwrap();

        for (internal, provider) in DETAIL_FIELD_MAPPING {
            assert_eq!(out[internal], raw_value[provider]);
        }
    }
}
