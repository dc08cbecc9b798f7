//! Projections of the flat registry listing into grouped views.
//!
//! Both strategies share the same front half: validate the base URL,
//! fetch the document, and locate `applications.application`. They
//! differ in how strictly they read each application's `instance` field
//! and in how they key the result.

mod servers;
mod services;

pub use servers::group_by_servers;
pub use services::group_by_services;

use serde_json::Value;
use shared::types::GroupedView;
use crate::error::QueryError;
use crate::registry::RegistryFetcher;

/// The grouping key. Anything unrecognized resolves to `Servers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Servers,
    Services,
}

impl GroupBy {
    pub const SERVERS: &'static str = "servers";
    pub const SERVICES: &'static str = "services";

    /// Case-insensitive; missing, blank or unknown keys fall back to
    /// `Servers`.
    pub fn resolve(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case(Self::SERVICES) => GroupBy::Services,
            Some(k) if k.eq_ignore_ascii_case(Self::SERVERS) => GroupBy::Servers,
            _ => GroupBy::default(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GroupBy::Servers => Self::SERVERS,
            GroupBy::Services => Self::SERVICES,
        }
    }

    /// Run the selected strategy against the registry at `base_url`
    pub async fn group<F: RegistryFetcher>(
        self,
        fetcher: &F,
        base_url: &str,
    ) -> Result<GroupedView, QueryError> {
        match self {
            GroupBy::Servers => group_by_servers(fetcher, base_url).await.map(GroupedView::from),
            GroupBy::Services => group_by_services(fetcher, base_url).await.map(GroupedView::from),
        }
    }
}

/// Validate `base_url` and fetch the registry document.
///
/// `grouping` only names the strategy in the catch-all error message.
async fn fetch_document<F: RegistryFetcher>(
    fetcher: &F,
    base_url: &str,
    grouping: &str,
) -> Result<Value, QueryError> {
    if base_url.trim().is_empty() {
        return Err(QueryError::invalid("Eureka server URL cannot be blank"));
    }

    let document = fetcher.fetch_applications(base_url).await.map_err(|err| {
        QueryError::reclassify(err, |other| {
            tracing::error!("Error grouping by {} from Eureka URL {}: {:#}", grouping, base_url, other);
            QueryError::grouping(format!("Failed to group by {} :{}", grouping, base_url), other)
        })
    })?;

    document.ok_or_else(|| {
        tracing::warn!("No data from Eureka server {}", base_url);
        QueryError::unavailable(format!("Eureka server does not respond: {}", base_url))
    })
}

/// `applications.application` when it is an array. A missing or
/// non-array node is treated as an empty registry.
fn applications(document: &Value) -> &[Value] {
    match document.pointer("/applications/application") {
        Some(Value::Array(apps)) => apps,
        Some(_) => {
            tracing::warn!("Eureka response has a non-array applications node");
            &[]
        }
        None => {
            tracing::warn!("Eureka response has no applications array");
            &[]
        }
    }
}

/// String field that is present and not blank
fn non_blank<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use serde_json::json;
    use shared::types::{ServerDetail, ServerView, ServiceDetail, ServiceView};

    type ErrorFactory = Box<dyn Fn(&str) -> anyhow::Error + Send + Sync>;

    pub(crate) enum Reply {
        Document(Value),
        NoDocument,
        Fail(ErrorFactory),
        Panic,
    }

    /// In-process registry returning a canned reply.
    pub(crate) struct StubFetcher {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn document(document: Value) -> Self {
            Self::new(Reply::Document(document))
        }

        pub(crate) fn no_document() -> Self {
            Self::new(Reply::NoDocument)
        }

        pub(crate) fn failing(f: impl Fn(&str) -> anyhow::Error + Send + Sync + 'static) -> Self {
            Self::new(Reply::Fail(Box::new(f)))
        }

        pub(crate) fn panicking() -> Self {
            Self::new(Reply::Panic)
        }

        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RegistryFetcher for StubFetcher {
        async fn fetch_applications(&self, base_url: &str) -> anyhow::Result<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Document(doc) => Ok(Some(doc.clone())),
                Reply::NoDocument => Ok(None),
                Reply::Fail(make) => Err(make(base_url)),
                Reply::Panic => panic!("registry client bug"),
            }
        }
    }

    // ---- registry document builders ----

    pub(crate) fn instance(host: &str, ip: &str, id: &str) -> Value {
        json!({
            "instanceId": id,
            "hostName": host,
            "ipAddr": ip,
            "port": {"$": 8080, "@enabled": "true"},
            "securePort": {"$": 443, "@enabled": "false"},
            "status": "UP",
            "lastUpdatedTimestamp": "1700000000000",
            "lastDirtyTimestamp": "1700000000000",
            "isCoordinatingDiscoveryServer": "false",
            "metadata": {"zone": "eu-west-1a"},
            "leaseInfo": {"renewalIntervalInSecs": 30, "durationInSecs": 90}
        })
    }

    pub(crate) fn app(name: &str, instances: Value) -> Value {
        json!({ "name": name, "instance": instances })
    }

    pub(crate) fn registry(apps: Vec<Value>) -> Value {
        json!({ "applications": { "versions__delta": "1", "application": apps } })
    }

    pub(crate) const URL: &str = "http://localhost:8761/eureka";

    pub(crate) fn find_host<'a>(view: &'a ServerView, host_name: &str) -> Option<&'a ServerDetail> {
        view.servers.iter().map(|g| &g.server).find(|s| s.host_name == host_name)
    }

    pub(crate) fn find_service<'a>(view: &'a ServiceView, service_name: &str) -> Option<&'a ServiceDetail> {
        view.services.iter().map(|g| &g.service).find(|s| s.service_name == service_name)
    }

    #[test]
    fn test_resolve_known_keys() {
        assert_eq!(GroupBy::resolve(Some("servers")), GroupBy::Servers);
        assert_eq!(GroupBy::resolve(Some("services")), GroupBy::Services);
        assert_eq!(GroupBy::resolve(Some("SERVICES")), GroupBy::Services);
        assert_eq!(GroupBy::resolve(Some(" Servers ")), GroupBy::Servers);
    }

    #[test]
    fn test_resolve_defaults_to_servers() {
        assert_eq!(GroupBy::resolve(None), GroupBy::Servers);
        assert_eq!(GroupBy::resolve(Some("")), GroupBy::Servers);
        assert_eq!(GroupBy::resolve(Some("   ")), GroupBy::Servers);
        assert_eq!(GroupBy::resolve(Some("zones")), GroupBy::Servers);
    }

    #[test]
    fn test_name_round_trips_through_resolve() {
        for group_by in [GroupBy::Servers, GroupBy::Services] {
            assert_eq!(GroupBy::resolve(Some(group_by.name())), group_by);
        }
    }

    #[tokio::test]
    async fn test_dispatch_selects_projection() {
        let fetcher = StubFetcher::document(registry(vec![app(
            "SVC",
            json!([instance("h1", "10.0.0.1", "svc-1")]),
        )]));

        let view = GroupBy::Services.group(&fetcher, URL).await.unwrap();
        assert!(matches!(view, GroupedView::Services(_)));

        let view = GroupBy::resolve(Some("nonsense")).group(&fetcher, URL).await.unwrap();
        assert!(matches!(view, GroupedView::Servers(_)));
    }

    #[tokio::test]
    async fn test_blank_url_is_invalid_without_fetching() {
        let fetcher = StubFetcher::document(registry(vec![]));

        for group_by in [GroupBy::Servers, GroupBy::Services] {
            let err = group_by.group(&fetcher, "  ").await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidRequest(_)));
        }
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_document_is_unavailable() {
        let fetcher = StubFetcher::no_document();

        for group_by in [GroupBy::Servers, GroupBy::Services] {
            let err = group_by.group(&fetcher, URL).await.unwrap_err();
            assert!(matches!(err, QueryError::Unavailable { .. }));
            assert!(err.to_string().contains(URL));
        }
    }

    #[tokio::test]
    async fn test_classified_fetch_errors_pass_through() {
        let fetcher = StubFetcher::failing(|url| {
            crate::registry::FetchFailure::Timeout
                .into_error(url, anyhow::anyhow!("read timed out"))
                .into()
        });

        for group_by in [GroupBy::Servers, GroupBy::Services] {
            let err = group_by.group(&fetcher, URL).await.unwrap_err();
            assert!(matches!(err, QueryError::Timeout { .. }));
            assert!(err.to_string().contains(URL));
        }
    }

    #[tokio::test]
    async fn test_unclassified_fetch_errors_become_grouping_failures() {
        let fetcher = StubFetcher::failing(|_| anyhow::anyhow!("connection pool poisoned"));

        let err = GroupBy::Servers.group(&fetcher, URL).await.unwrap_err();
        assert!(matches!(err, QueryError::Grouping { .. }));
        assert_eq!(err.to_string(), format!("Failed to group by server :{}", URL));

        let err = GroupBy::Services.group(&fetcher, URL).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Failed to group by service :{}", URL));
    }

    #[test]
    fn test_applications_lookup() {
        assert_eq!(applications(&registry(vec![json!({})])).len(), 1);
        assert!(applications(&json!({})).is_empty());
        assert!(applications(&json!({"applications": {}})).is_empty());
        assert!(applications(&json!({"applications": {"application": {"name": "A"}}})).is_empty());
    }
}
