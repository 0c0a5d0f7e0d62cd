use crate::domain::merchant::MerchantConfig;
use crate::domain::ports::{GatewayFactoryBox, Merchant};
use crate::error::{MerchantError, Result};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

struct Entry {
    config: MerchantConfig,
    instance: OnceCell<Merchant>,
}

/// Holds every configured merchant and builds its gateway client on first use.
///
/// Each id owns its own `OnceCell`, so concurrent first requests for the same
/// id construct the client once while other ids are not blocked. A failed
/// construction leaves the cell empty and the next request tries again.
pub struct MerchantRegistry {
    entries: HashMap<String, Entry>,
    factory: GatewayFactoryBox,
}

impl MerchantRegistry {
    pub fn new(configs: impl IntoIterator<Item = MerchantConfig>, factory: GatewayFactoryBox) -> Self {
        let entries = configs
            .into_iter()
            .map(|config| {
                (
                    config.id.clone(),
                    Entry {
                        config,
                        instance: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self { entries, factory }
    }

    pub fn get(&self, id: &str) -> Result<Merchant> {
        let entry = self.entry(id)?;
        let merchant = entry.instance.get_or_try_init(|| {
            debug!(merchant = %id, "constructing merchant");
            self.factory.create(&entry.config)
        })?;
        Ok(merchant.clone())
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ensure_constructed(&self, id: &str) -> Result<()> {
        self.get(id).map(|_| ())
    }

    pub fn is_constructed(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.instance.get().is_some())
    }

    /// Constructs every configured merchant.
    pub fn all(&self) -> Result<BTreeMap<String, Merchant>> {
        self.ids()
            .map(|id| self.get(id).map(|merchant| (id.to_string(), merchant)))
            .collect()
    }

    pub fn config(&self, id: &str) -> Result<&MerchantConfig> {
        self.entry(id).map(|entry| &entry.config)
    }

    /// Configured ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    fn entry(&self, id: &str) -> Result<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| MerchantError::NotFound(id.to_string()))
    }
}
