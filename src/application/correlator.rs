use crate::domain::merchant::{
    Destination, DestinationPages, MerchantConfig, Page, RESERVED_PARAMS,
};
pub use crate::domain::merchant::{PARAM_INTERNAL_ID, PARAM_MERCHANT, PARAM_USERNAME};
use crate::domain::ports::{Gateway, SessionStoreBox};
use crate::domain::transaction::{CheckoutUrls, InternalId};
use crate::error::{MerchantError, Result};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Produces a fresh internal id for every transaction.
pub type IdGenerator = Box<dyn Fn() -> InternalId + Send + Sync>;

const REMEMBERED_URL_PREFIX: &str = "merchant.url.";

/// Allocates internal ids and builds the notify/return/cancel URLs that carry them.
///
/// Page resolution per destination: the merchant's own override, then the
/// application-wide override, then the built-in route.
pub struct TransactionCorrelator {
    base_url: Url,
    pages: DestinationPages,
    sessions: SessionStoreBox,
    id_generator: IdGenerator,
}

impl TransactionCorrelator {
    pub fn new(base_url: Url, pages: DestinationPages, sessions: SessionStoreBox) -> Result<Self> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(MerchantError::ConfigError(format!(
                "base URL must be an absolute http(s) URL, got '{base_url}'"
            )));
        }
        pages.validate()?;
        // Routes are joined relative to the base, which needs a trailing slash.
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            pages,
            sessions,
            id_generator: Box::new(InternalId::generate),
        })
    }

    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn begin_transaction(&self, merchant: &dyn Gateway, username: &str) -> Result<CheckoutUrls> {
        let internal_id = (self.id_generator)();
        let config = merchant.config();

        let urls = CheckoutUrls {
            notify_url: self.callback_url(config, Destination::Notify, username, &internal_id)?,
            return_url: self.callback_url(config, Destination::Return, username, &internal_id)?,
            cancel_url: self.callback_url(config, Destination::Cancel, username, &internal_id)?,
            internal_id,
        };

        info!(
            merchant = %config.id,
            username,
            internal_id = %urls.internal_id,
            "transaction started"
        );
        Ok(urls)
    }

    pub fn page_for(&self, merchant: &MerchantConfig, destination: Destination) -> Page {
        merchant
            .pages
            .page(destination)
            .or_else(|| self.pages.page(destination))
            .cloned()
            .unwrap_or_else(|| Page::default_for(destination))
    }

    /// Absolute URL for one destination. The correlation parameters come
    /// first and always carry this transaction's values.
    pub fn callback_url(
        &self,
        merchant: &MerchantConfig,
        destination: Destination,
        username: &str,
        internal_id: &InternalId,
    ) -> Result<Url> {
        let page = self.page_for(merchant, destination);
        let mut url = self.base_url.join(&page.route)?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(PARAM_MERCHANT, &merchant.id)
                .append_pair(PARAM_USERNAME, username)
                .append_pair(PARAM_INTERNAL_ID, internal_id.as_str());
            for (key, value) in &page.params {
                if RESERVED_PARAMS.contains(&key.as_str()) {
                    warn!(merchant = %merchant.id, param = %key, "reserved page param ignored");
                    continue;
                }
                query.append_pair(key, value);
            }
        }

        debug!(merchant = %merchant.id, destination = destination.as_str(), %url, "callback url built");
        Ok(url)
    }

    /// Stores a URL in the user's session to come back to later.
    /// `ttl` of `None` keeps it until recalled or the session ends.
    pub async fn remember_url(
        &self,
        session: &str,
        name: &str,
        url: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.sessions
            .put(session, &remembered_url_key(name), url.to_string(), ttl)
            .await
    }

    /// Returns a remembered URL once.
    pub async fn recall_url(&self, session: &str, name: &str) -> Result<Option<String>> {
        self.sessions.take(session, &remembered_url_key(name)).await
    }
}

fn remembered_url_key(name: &str) -> String {
    format!("{REMEMBERED_URL_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::merchant::MerchantEntry;
    use crate::domain::transaction::{Deposit, HistoryDocument, Redirect};
    use crate::infrastructure::in_memory::InMemorySessionStore;
    use serde_json::json;
    use std::collections::HashMap;

    struct StubGateway(MerchantConfig);

    impl Gateway for StubGateway {
        fn config(&self) -> &MerchantConfig {
            &self.0
        }

        fn prepare_checkout(&self, _: &Deposit, _: &CheckoutUrls) -> Result<Redirect> {
            Err(MerchantError::GatewayError("stub".to_string()))
        }

        fn acknowledge(&self, _: &HistoryDocument) -> String {
            "OK".to_string()
        }
    }

    fn gateway(id: &str, entry: serde_json::Value) -> StubGateway {
        let entry: MerchantEntry = serde_json::from_value(entry).unwrap();
        StubGateway(MerchantConfig::from_entry(id, entry).unwrap())
    }

    fn correlator(base: &str) -> TransactionCorrelator {
        TransactionCorrelator::new(
            Url::parse(base).unwrap(),
            DestinationPages::default(),
            Box::new(InMemorySessionStore::new()),
        )
        .unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_paypal_scenario() {
        let correlator = correlator("https://shop.test/")
            .with_id_generator(Box::new(|| InternalId::parse("abc123").unwrap()));
        let paypal = gateway("paypal", json!({"purse": "p1", "secret": "s1"}));

        let urls = correlator.begin_transaction(&paypal, "alice").unwrap();

        assert_eq!(urls.internal_id.as_str(), "abc123");
        assert_eq!(
            urls.notify_url.as_str(),
            "https://shop.test/merchant/pay/confirm?merchant=paypal&username=alice&internalid=abc123"
        );
        assert_eq!(urls.return_url.path(), "/merchant/pay/success");
        assert_eq!(urls.cancel_url.path(), "/merchant/pay/failure");
        assert!(!urls.notify_url.as_str().contains("s1"));
    }

    #[test]
    fn test_each_transaction_gets_its_own_id() {
        let correlator = correlator("https://shop.test/");
        let paypal = gateway("paypal", json!({}));

        let first = correlator.begin_transaction(&paypal, "alice").unwrap();
        let second = correlator.begin_transaction(&paypal, "alice").unwrap();

        assert_ne!(first.internal_id, second.internal_id);
        for urls in [&first, &second] {
            for url in [&urls.notify_url, &urls.return_url, &urls.cancel_url] {
                assert_eq!(query(url)["internalid"], urls.internal_id.as_str());
            }
        }
        assert_ne!(first.notify_url, second.notify_url);
    }

    #[test]
    fn test_base_path_without_trailing_slash_is_kept() {
        let correlator = correlator("https://shop.test/app");
        let paypal = gateway("paypal", json!({}));
        let urls = correlator.begin_transaction(&paypal, "alice").unwrap();
        assert_eq!(urls.notify_url.path(), "/app/merchant/pay/confirm");
    }

    #[test]
    fn test_rejects_non_http_base() {
        let result = TransactionCorrelator::new(
            Url::parse("mailto:ops@shop.test").unwrap(),
            DestinationPages::default(),
            Box::new(InMemorySessionStore::new()),
        );
        assert!(matches!(result, Err(MerchantError::ConfigError(_))));
    }

    #[test]
    fn test_page_overrides_and_extra_params() {
        let mut app_pages = DestinationPages::default();
        app_pages.set(Destination::Return, Page::new("thanks").with_param("lang", "en"));
        let correlator = TransactionCorrelator::new(
            Url::parse("https://shop.test/").unwrap(),
            app_pages,
            Box::new(InMemorySessionStore::new()),
        )
        .unwrap();
        let webmoney = gateway(
            "webmoney",
            json!({
                "pages": {
                    "notify": {"route": "hooks/wm", "params": {"v": "2"}}
                }
            }),
        );

        let urls = correlator.begin_transaction(&webmoney, "bob smith").unwrap();

        assert_eq!(urls.notify_url.path(), "/hooks/wm");
        let notify = query(&urls.notify_url);
        assert_eq!(notify["v"], "2");
        assert_eq!(notify["merchant"], "webmoney");
        assert!(
            urls.notify_url
                .as_str()
                .starts_with("https://shop.test/hooks/wm?merchant=webmoney&username=bob+smith&internalid=")
        );
        assert!(urls.notify_url.as_str().ends_with("&v=2"));

        assert_eq!(urls.return_url.path(), "/thanks");
        let ret = query(&urls.return_url);
        assert_eq!(ret["lang"], "en");
        assert_eq!(ret["username"], "bob smith");

        assert_eq!(urls.cancel_url.path(), "/merchant/pay/failure");
    }

    #[test]
    fn test_reserved_app_page_params_are_rejected() {
        let mut app_pages = DestinationPages::default();
        app_pages.set(Destination::Notify, Page::new("hook").with_param("internalid", "fixed"));
        let result = TransactionCorrelator::new(
            Url::parse("https://shop.test/").unwrap(),
            app_pages,
            Box::new(InMemorySessionStore::new()),
        );
        assert!(matches!(result, Err(MerchantError::ConfigError(_))));
    }

    #[test]
    fn test_urls_keep_their_own_id_when_a_page_shadows_it() {
        let correlator = correlator("https://shop.test/");
        // Built by hand, so it skips the checks done when settings load.
        let mut pages = DestinationPages::default();
        pages.set(
            Destination::Notify,
            Page::new("hook")
                .with_param("internalid", "fixed")
                .with_param("username", "svc"),
        );
        let paypal = StubGateway(MerchantConfig {
            id: "paypal".to_string(),
            gateway: "paypal".to_string(),
            credentials: Default::default(),
            pages,
        });

        let first = correlator.begin_transaction(&paypal, "alice").unwrap();
        let second = correlator.begin_transaction(&paypal, "alice").unwrap();

        for urls in [&first, &second] {
            let pairs: Vec<(String, String)> = urls.notify_url.query_pairs().into_owned().collect();
            assert_eq!(
                pairs,
                vec![
                    ("merchant".to_string(), "paypal".to_string()),
                    ("username".to_string(), "alice".to_string()),
                    ("internalid".to_string(), urls.internal_id.to_string()),
                ]
            );
        }
        assert_ne!(first.notify_url, second.notify_url);
    }

    #[tokio::test]
    async fn test_remember_and_recall_once() {
        let correlator = correlator("https://shop.test/");
        correlator
            .remember_url("sess-1", "checkout", "https://shop.test/cart", None)
            .await
            .unwrap();

        assert_eq!(correlator.recall_url("sess-2", "checkout").await.unwrap(), None);
        assert_eq!(correlator.recall_url("sess-1", "other").await.unwrap(), None);
        assert_eq!(
            correlator.recall_url("sess-1", "checkout").await.unwrap().as_deref(),
            Some("https://shop.test/cart")
        );
        assert_eq!(correlator.recall_url("sess-1", "checkout").await.unwrap(), None);
    }
}
