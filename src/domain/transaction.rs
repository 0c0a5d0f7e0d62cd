use crate::error::{MerchantError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// The JSON object stored per transaction. Its schema belongs to the caller.
pub type HistoryDocument = Map<String, Value>;

const MAX_ID_LEN: usize = 64;

/// Token correlating one checkout attempt across its callback URLs and its
/// history entry.
///
/// Ids built with [`InternalId::generate`] are random v4 UUIDs in simple
/// (32 lowercase hex) form. Ids arriving from outside go through
/// [`InternalId::parse`], which only admits `[A-Za-z0-9_-]` so an id can
/// always be used as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InternalId(String);

impl InternalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let valid_len = (2..=MAX_ID_LEN).contains(&raw.len());
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid_len && valid_chars {
            Ok(Self(raw.to_string()))
        } else {
            Err(MerchantError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two characters, used to spread history entries over subdirectories.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InternalId {
    type Error = MerchantError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<InternalId> for String {
    fn from(id: InternalId) -> Self {
        id.0
    }
}

/// Shallow merge: every top-level key of `partial` replaces the same key in `base`.
pub fn merge(base: &mut HistoryDocument, partial: HistoryDocument) {
    for (key, value) in partial {
        base.insert(key, value);
    }
}

/// A transaction as seen by a callback handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub internal_id: InternalId,
    pub merchant: String,
    pub username: String,
    pub payload: HistoryDocument,
}

/// The three callback URLs handed to a gateway for one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutUrls {
    pub internal_id: InternalId,
    pub notify_url: Url,
    pub return_url: Url,
    pub cancel_url: Url,
}

/// Represents a positive deposit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Deposit {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(MerchantError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(Self {
            amount,
            currency: currency.into(),
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Where the gateway wants the end user's browser to go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub action: Url,
    pub method: String,
    pub fields: BTreeMap<String, String>,
}
