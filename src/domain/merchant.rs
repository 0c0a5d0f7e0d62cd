use crate::error::{MerchantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PARAM_MERCHANT: &str = "merchant";
pub const PARAM_USERNAME: &str = "username";
pub const PARAM_INTERNAL_ID: &str = "internalid";

/// Query parameters every callback URL carries. Page params may not reuse them.
pub const RESERVED_PARAMS: [&str; 3] = [PARAM_MERCHANT, PARAM_USERNAME, PARAM_INTERNAL_ID];

/// The three places a gateway sends the user or its server after checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Notify,
    Return,
    Cancel,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Notify => "notify",
            Destination::Return => "return",
            Destination::Cancel => "cancel",
        }
    }
}

/// A route relative to the application's base URL, with fixed extra query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Page {
    pub route: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Page {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Rejects params that would shadow the correlation parameters.
    pub fn validate(&self) -> Result<()> {
        match self.params.keys().find(|key| RESERVED_PARAMS.contains(&key.as_str())) {
            Some(key) => Err(MerchantError::ConfigError(format!(
                "page '{}' may not set reserved parameter '{key}'",
                self.route
            ))),
            None => Ok(()),
        }
    }

    /// Built-in routes served by the pay controller.
    pub fn default_for(destination: Destination) -> Self {
        match destination {
            Destination::Notify => Self::new("merchant/pay/confirm"),
            Destination::Return => Self::new("merchant/pay/success"),
            Destination::Cancel => Self::new("merchant/pay/failure"),
        }
    }
}

/// Per-destination page overrides. Unset destinations fall back to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationPages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<Page>,
    #[serde(default, rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_page: Option<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel: Option<Page>,
}

impl DestinationPages {
    pub fn page(&self, destination: Destination) -> Option<&Page> {
        match destination {
            Destination::Notify => self.notify.as_ref(),
            Destination::Return => self.return_page.as_ref(),
            Destination::Cancel => self.cancel.as_ref(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        [&self.notify, &self.return_page, &self.cancel]
            .into_iter()
            .flatten()
            .try_for_each(Page::validate)
    }

    pub fn set(&mut self, destination: Destination, page: Page) {
        match destination {
            Destination::Notify => self.notify = Some(page),
            Destination::Return => self.return_page = Some(page),
            Destination::Cancel => self.cancel = Some(page),
        }
    }
}

/// A merchant entry exactly as written in the settings file.
///
/// `gateway` and `pages` are named options; every other key is a credential
/// and must hold a string.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default)]
    pub pages: DestinationPages,
    #[serde(flatten)]
    pub credentials: BTreeMap<String, String>,
}

impl fmt::Debug for MerchantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantEntry")
            .field("gateway", &self.gateway)
            .field("pages", &self.pages)
            .field("credentials", &RedactedKeys(&self.credentials))
            .finish()
    }
}

/// Validated configuration of one merchant, with its registry id merged in.
#[derive(Clone, PartialEq, Eq)]
pub struct MerchantConfig {
    pub id: String,
    pub gateway: String,
    pub credentials: BTreeMap<String, String>,
    pub pages: DestinationPages,
}

impl MerchantConfig {
    /// Merges the registry id into its settings entry. The gateway type
    /// defaults to the id when the entry does not name one.
    pub fn from_entry(id: impl Into<String>, entry: MerchantEntry) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(MerchantError::ConfigError(
                "merchant id must not be empty".to_string(),
            ));
        }
        let gateway = entry.gateway.unwrap_or_else(|| id.clone());
        if gateway.trim().is_empty() {
            return Err(MerchantError::ConfigError(format!(
                "merchant '{id}' has an empty gateway type"
            )));
        }
        entry.pages.validate()?;
        Ok(Self {
            id,
            gateway,
            credentials: entry.credentials,
            pages: entry.pages,
        })
    }

    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).map(String::as_str)
    }
}

impl fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("id", &self.id)
            .field("gateway", &self.gateway)
            .field("credentials", &RedactedKeys(&self.credentials))
            .field("pages", &self.pages)
            .finish()
    }
}

struct RedactedKeys<'a>(&'a BTreeMap<String, String>);

impl fmt::Debug for RedactedKeys<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "***")))
            .finish()
    }
}
