//! Application layer orchestrating the checkout flow.
//!
//! The `MerchantRegistry` resolves gateway clients, the `TransactionCorrelator`
//! ties a checkout attempt to its callback URLs, the `HistoryLedger` keeps the
//! per-transaction JSON history, and the `CallbackDispatcher` drives all three
//! from a deposit request to the provider's callbacks.

pub mod correlator;
pub mod dispatcher;
pub mod ledger;
pub mod registry;
