use super::merchant::MerchantConfig;
use super::transaction::{CheckoutUrls, Deposit, HistoryDocument, InternalId, Redirect};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A client for one merchant account at a payment gateway.
///
/// Signing, provider calls and signature checks live behind this trait.
pub trait Gateway: Send + Sync {
    fn config(&self) -> &MerchantConfig;

    fn id(&self) -> &str {
        &self.config().id
    }

    fn gateway_type(&self) -> &str {
        &self.config().gateway
    }

    /// Builds the off-site redirect for a deposit.
    fn prepare_checkout(&self, deposit: &Deposit, urls: &CheckoutUrls) -> Result<Redirect>;

    /// Body to answer a server-to-server notification with.
    fn acknowledge(&self, payload: &HistoryDocument) -> String;
}

pub type Merchant = Arc<dyn Gateway>;

pub trait GatewayFactory: Send + Sync {
    fn create(&self, config: &MerchantConfig) -> Result<Merchant>;
}

impl<F> GatewayFactory for F
where
    F: Fn(&MerchantConfig) -> Result<Merchant> + Send + Sync,
{
    fn create(&self, config: &MerchantConfig) -> Result<Merchant> {
        self(config)
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn read(&self, id: &InternalId) -> Result<Option<HistoryDocument>>;
    async fn write(&self, id: &InternalId, document: &HistoryDocument) -> Result<()>;
    fn location(&self, id: &InternalId) -> String;
}

/// Values scoped to one user session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: &str, key: &str, value: String, ttl: Option<Duration>)
    -> Result<()>;
    /// Returns the value once and forgets it.
    async fn take(&self, session: &str, key: &str) -> Result<Option<String>>;
}

pub type GatewayFactoryBox = Box<dyn GatewayFactory>;
pub type HistoryStoreBox = Box<dyn HistoryStore>;
pub type SessionStoreBox = Box<dyn SessionStore>;
