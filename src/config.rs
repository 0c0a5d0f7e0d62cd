use crate::application::correlator::TransactionCorrelator;
use crate::application::dispatcher::CallbackDispatcher;
use crate::application::ledger::HistoryLedger;
use crate::application::registry::MerchantRegistry;
use crate::domain::merchant::{DestinationPages, MerchantConfig, MerchantEntry};
use crate::domain::ports::{GatewayFactoryBox, HistoryStoreBox, SessionStoreBox};
use crate::error::{MerchantError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_DATA_DIR: &str = "runtime/merchant";

/// Application settings, read from a JSON file.
///
/// ```json
/// {
///   "base_url": "https://shop.example/",
///   "data_dir": "runtime/merchant",
///   "remembered_url_ttl_secs": 3600,
///   "pages": {"return": {"route": "billing/thanks"}},
///   "merchants": {
///     "paypal": {"purse": "...", "secret": "...", "checkout_url": "https://..."},
///     "webmoney": {"gateway": "webmoney", "purse": "...", "secret": "..."}
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub base_url: Url,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub remembered_url_ttl_secs: Option<u64>,
    #[serde(default)]
    pub pages: DestinationPages,
    #[serde(default)]
    pub merchants: BTreeMap<String, MerchantEntry>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MerchantError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates settings. Every merchant entry must be usable.
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(raw)
            .map_err(|e| MerchantError::ConfigError(format!("invalid settings: {e}")))?;
        if !matches!(settings.base_url.scheme(), "http" | "https") {
            return Err(MerchantError::ConfigError(format!(
                "base_url must be http(s), got '{}'",
                settings.base_url
            )));
        }
        settings.pages.validate()?;
        settings.merchant_configs()?;
        Ok(settings)
    }

    pub fn merchant_configs(&self) -> Result<Vec<MerchantConfig>> {
        self.merchants
            .iter()
            .map(|(id, entry)| MerchantConfig::from_entry(id.clone(), entry.clone()))
            .collect()
    }

    pub fn remembered_url_ttl(&self) -> Option<Duration> {
        self.remembered_url_ttl_secs.map(Duration::from_secs)
    }

    /// Wires the registry, correlator and ledger described by these settings.
    pub fn build_dispatcher(
        &self,
        history: HistoryStoreBox,
        sessions: SessionStoreBox,
        factory: GatewayFactoryBox,
    ) -> Result<CallbackDispatcher> {
        let registry = MerchantRegistry::new(self.merchant_configs()?, factory);
        let correlator =
            TransactionCorrelator::new(self.base_url.clone(), self.pages.clone(), sessions)?;
        let ledger = HistoryLedger::new(history);
        Ok(CallbackDispatcher::new(registry, correlator, ledger)
            .with_remembered_url_ttl(self.remembered_url_ttl()))
    }
}
