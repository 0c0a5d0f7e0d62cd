use crate::application::correlator::{PARAM_INTERNAL_ID, PARAM_MERCHANT, PARAM_USERNAME};
use crate::domain::transaction::{HistoryDocument, InternalId};
use crate::error::{MerchantError, Result};
use serde_json::Value;
use url::Url;

/// Correlation data carried by a notify/return/cancel URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub merchant: String,
    pub username: String,
    pub internal_id: InternalId,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Result<Self> {
        let mut merchant = None;
        let mut username = None;
        let mut internal_id = None;
        for (key, value) in url.query_pairs() {
            let slot = match &*key {
                PARAM_MERCHANT => &mut merchant,
                PARAM_USERNAME => &mut username,
                PARAM_INTERNAL_ID => &mut internal_id,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let internal_id = internal_id.ok_or_else(|| missing(PARAM_INTERNAL_ID))?;
        Ok(Self {
            merchant: merchant.ok_or_else(|| missing(PARAM_MERCHANT))?,
            username: username.ok_or_else(|| missing(PARAM_USERNAME))?,
            internal_id: InternalId::parse(&internal_id)?,
        })
    }
}

fn missing(param: &str) -> MerchantError {
    MerchantError::InvalidCallback(format!("missing '{param}' parameter"))
}

/// Decodes a JSON provider payload. Only objects can be merged into history.
pub fn payload_from_json(body: &str) -> Result<HistoryDocument> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(document) => Ok(document),
        other => Err(MerchantError::InvalidCallback(format!(
            "payload must be a JSON object, got {other}"
        ))),
    }
}

/// Decodes a form-encoded provider payload into string fields.
/// Repeated keys keep the last value.
pub fn payload_from_form(body: &str) -> HistoryDocument {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect()
}
