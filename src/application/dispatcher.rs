use super::correlator::TransactionCorrelator;
use super::ledger::HistoryLedger;
use super::registry::MerchantRegistry;
use crate::domain::transaction::{
    CheckoutUrls, Deposit, HistoryDocument, InternalId, Redirect, TransactionRecord,
};
use crate::error::Result;
use crate::interfaces::callback::CallbackParams;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Name under which the user's pre-checkout location is remembered.
pub const CHECKOUT_URL_NAME: &str = "checkout";

pub const STATUS_INITIATED: &str = "initiated";

/// Everything the host needs to send the user off to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub urls: CheckoutUrls,
    pub redirect: Redirect,
}

/// Body to return to a provider's server-to-server notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub internal_id: InternalId,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Cancel,
}

/// What the host renders after the user comes back from the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub internal_id: InternalId,
    pub merchant: String,
    pub history: HistoryDocument,
    pub back_url: Option<String>,
}

/// Runs the checkout flow: starting a deposit and handling the three callbacks.
pub struct CallbackDispatcher {
    registry: MerchantRegistry,
    correlator: TransactionCorrelator,
    ledger: HistoryLedger,
    remembered_url_ttl: Option<Duration>,
}

impl CallbackDispatcher {
    pub fn new(
        registry: MerchantRegistry,
        correlator: TransactionCorrelator,
        ledger: HistoryLedger,
    ) -> Self {
        Self {
            registry,
            correlator,
            ledger,
            remembered_url_ttl: None,
        }
    }

    pub fn with_remembered_url_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.remembered_url_ttl = ttl;
        self
    }

    pub fn registry(&self) -> &MerchantRegistry {
        &self.registry
    }

    pub fn correlator(&self) -> &TransactionCorrelator {
        &self.correlator
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Starts a deposit: allocates the transaction, records it as initiated
    /// and asks the gateway where to send the user.
    pub async fn initiate(
        &self,
        merchant_id: &str,
        username: &str,
        session: &str,
        back_url: Option<&str>,
        deposit: &Deposit,
    ) -> Result<Checkout> {
        let merchant = self.registry.get(merchant_id)?;
        let urls = self.correlator.begin_transaction(merchant.as_ref(), username)?;
        let redirect = merchant.prepare_checkout(deposit, &urls)?;

        if let Some(back_url) = back_url {
            self.correlator
                .remember_url(session, CHECKOUT_URL_NAME, back_url, self.remembered_url_ttl)
                .await?;
        }

        let mut document = HistoryDocument::new();
        document.insert("merchant".into(), Value::String(merchant_id.to_string()));
        document.insert("username".into(), Value::String(username.to_string()));
        document.insert("amount".into(), Value::String(deposit.amount.to_string()));
        document.insert("currency".into(), Value::String(deposit.currency.clone()));
        document.insert("status".into(), Value::String(STATUS_INITIATED.to_string()));
        self.ledger.write(&urls.internal_id, &document).await?;

        Ok(Checkout { urls, redirect })
    }

    pub async fn on_notify(
        &self,
        params: &CallbackParams,
        payload: HistoryDocument,
    ) -> Result<Acknowledgement> {
        let merchant = self.registry.get(&params.merchant)?;
        let history = self.ledger.update(&params.internal_id, payload).await?;
        info!(
            merchant = %params.merchant,
            internal_id = %params.internal_id,
            "notification recorded"
        );
        Ok(Acknowledgement {
            internal_id: params.internal_id.clone(),
            body: merchant.acknowledge(&history),
        })
    }

    pub async fn on_success(
        &self,
        params: &CallbackParams,
        session: &str,
        payload: HistoryDocument,
    ) -> Result<Outcome> {
        self.finish(OutcomeKind::Success, params, session, payload).await
    }

    pub async fn on_cancel(
        &self,
        params: &CallbackParams,
        session: &str,
        payload: HistoryDocument,
    ) -> Result<Outcome> {
        self.finish(OutcomeKind::Cancel, params, session, payload).await
    }

    /// The transaction a callback refers to, with its history so far.
    pub async fn record(&self, params: &CallbackParams) -> Result<TransactionRecord> {
        Ok(TransactionRecord {
            internal_id: params.internal_id.clone(),
            merchant: params.merchant.clone(),
            username: params.username.clone(),
            payload: self.ledger.read(&params.internal_id).await?,
        })
    }

    async fn finish(
        &self,
        kind: OutcomeKind,
        params: &CallbackParams,
        session: &str,
        payload: HistoryDocument,
    ) -> Result<Outcome> {
        if !self.registry.has(&params.merchant) {
            warn!(merchant = %params.merchant, internal_id = %params.internal_id, "callback for unknown merchant");
        }
        let history = self.ledger.update(&params.internal_id, payload).await?;
        let back_url = self.correlator.recall_url(session, CHECKOUT_URL_NAME).await?;
        info!(
            merchant = %params.merchant,
            internal_id = %params.internal_id,
            outcome = ?kind,
            "user returned from gateway"
        );

        Ok(Outcome {
            kind,
            internal_id: params.internal_id.clone(),
            merchant: params.merchant.clone(),
            history,
            back_url,
        })
    }
}
