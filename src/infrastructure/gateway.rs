use crate::domain::merchant::MerchantConfig;
use crate::domain::ports::{Gateway, GatewayFactory, Merchant};
use crate::domain::transaction::{CheckoutUrls, Deposit, HistoryDocument, Redirect};
use crate::error::{MerchantError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Credential naming the provider's checkout endpoint.
pub const CHECKOUT_URL_KEY: &str = "checkout_url";
/// Credential naming the merchant's account at the provider.
pub const PURSE_KEY: &str = "purse";

/// Gateway client that forwards the checkout as a plain form post.
///
/// It carries no provider protocol: it hands the deposit and callback URLs to
/// the provider's checkout endpoint and answers notifications with `OK`. Real
/// providers plug in through their own [`GatewayFactory`].
pub struct PassthroughGateway {
    config: MerchantConfig,
    checkout_url: Url,
}

impl PassthroughGateway {
    pub fn new(config: MerchantConfig) -> Result<Self> {
        let raw = config.credential(CHECKOUT_URL_KEY).ok_or_else(|| {
            MerchantError::GatewayError(format!(
                "merchant '{}' has no '{CHECKOUT_URL_KEY}' configured",
                config.id
            ))
        })?;
        let checkout_url = Url::parse(raw)?;
        Ok(Self {
            config,
            checkout_url,
        })
    }
}

impl Gateway for PassthroughGateway {
    fn config(&self) -> &MerchantConfig {
        &self.config
    }

    fn prepare_checkout(&self, deposit: &Deposit, urls: &CheckoutUrls) -> Result<Redirect> {
        let mut fields = BTreeMap::new();
        if let Some(purse) = self.config.credential(PURSE_KEY) {
            fields.insert(PURSE_KEY.to_string(), purse.to_string());
        }
        fields.insert("amount".to_string(), deposit.amount.to_string());
        fields.insert("currency".to_string(), deposit.currency.clone());
        if let Some(description) = &deposit.description {
            fields.insert("description".to_string(), description.clone());
        }
        fields.insert("internalid".to_string(), urls.internal_id.to_string());
        fields.insert("notify_url".to_string(), urls.notify_url.to_string());
        fields.insert("return_url".to_string(), urls.return_url.to_string());
        fields.insert("cancel_url".to_string(), urls.cancel_url.to_string());

        Ok(Redirect {
            action: self.checkout_url.clone(),
            method: "POST".to_string(),
            fields,
        })
    }

    fn acknowledge(&self, _payload: &HistoryDocument) -> String {
        "OK".to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughGatewayFactory;

impl GatewayFactory for PassthroughGatewayFactory {
    fn create(&self, config: &MerchantConfig) -> Result<Merchant> {
        info!(merchant = %config.id, gateway = %config.gateway, "creating gateway client");
        Ok(Arc::new(PassthroughGateway::new(config.clone())?))
    }
}
