use std::future::Future;
use std::time::Duration;
use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use serde_json::Value;
use shared::protocol::{ReturnCode, REGISTRY_APPS_SUFFIX};
use crate::config::RegistryConfig;
use crate::error::{BoxError, QueryError};

/// Source of the raw registry document.
///
/// `Ok(None)` means the registry answered without a document. Transport
/// failures should come back as a classified `QueryError` inside the
/// `anyhow::Error`; anything else is treated as unexpected.
pub trait RegistryFetcher: Send + Sync {
    fn fetch_applications(
        &self,
        base_url: &str,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// Why a registry request failed, as far as the caller cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Timeout,
    ConnectionRefused,
    UnknownHost,
    /// Registry reachable but the response was unusable
    Protocol,
    Other,
}

impl FetchFailure {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout
        } else if err.is_connect() {
            if is_dns_failure(err) {
                FetchFailure::UnknownHost
            } else {
                FetchFailure::ConnectionRefused
            }
        } else if err.is_status() || err.is_body() || err.is_decode() || err.is_redirect() {
            FetchFailure::Protocol
        } else {
            FetchFailure::Other
        }
    }

    pub fn into_error(self, url: &str, cause: impl Into<BoxError>) -> QueryError {
        let source = Some(cause.into());
        match self {
            FetchFailure::Timeout => QueryError::Timeout {
                message: format!("Connection timeout to Eureka server: {}", url),
                source,
            },
            FetchFailure::ConnectionRefused => QueryError::Unavailable {
                code: ReturnCode::ServiceDown,
                message: format!("Cannot connect to Eureka server: {}", url),
                source,
            },
            FetchFailure::UnknownHost => QueryError::Unavailable {
                code: ReturnCode::InvalidHost,
                message: format!("Unknown host in Eureka URL: {}", url),
                source,
            },
            FetchFailure::Protocol => QueryError::Unavailable {
                code: ReturnCode::ServiceUnavailable,
                message: format!("Service is currently not responding: {}", url),
                source,
            },
            FetchFailure::Other => QueryError::Unavailable {
                code: ReturnCode::Unknown,
                message: format!("Cannot connect to Eureka server: {}", url),
                source,
            },
        }
    }
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// `<base>/apps`, dropping a single trailing slash from the base
pub fn apps_url(base_url: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}{}", base, REGISTRY_APPS_SUFFIX)
}

/// Fetches `/apps` from a Eureka server over HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build registry HTTP client")?;

        Ok(Self { client })
    }
}

impl RegistryFetcher for HttpFetcher {
    async fn fetch_applications(&self, base_url: &str) -> Result<Option<Value>> {
        let url = apps_url(base_url);
        tracing::debug!("Fetching Eureka apps from: {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error connecting to Eureka at {}: {}", url, e);
                FetchFailure::classify(&e).into_error(&url, e)
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Eureka at {} answered with an error status: {}", url, e);
                FetchFailure::Protocol.into_error(&url, e)
            })?;

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::classify(&e).into_error(&url, e))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!("Eureka at {} returned an empty body", url);
            return Ok(None);
        }

        let document: Value = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!("Eureka at {} returned invalid JSON: {}", url, e);
            FetchFailure::Protocol.into_error(&url, e)
        })?;

        tracing::debug!("Successfully fetched Eureka apps from: {}", url);
        Ok(match document {
            Value::Null => None,
            document => Some(document),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::SocketAddr;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    /// Serve `app` on an ephemeral local port
    pub(crate) async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher(timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::new(&RegistryConfig {
            timeout_ms,
            ..RegistryConfig::default()
        })
        .unwrap()
    }

    fn classified(err: anyhow::Error) -> QueryError {
        err.downcast::<QueryError>().expect("transport errors are classified")
    }

    #[test]
    fn test_apps_url() {
        assert_eq!(apps_url("http://h:8761/eureka"), "http://h:8761/eureka/apps");
        assert_eq!(apps_url("http://h:8761/eureka/"), "http://h:8761/eureka/apps");
    }

    #[test]
    fn test_failure_classes() {
        let url = "http://h:8761/eureka/apps";
        let cases = [
            (FetchFailure::Timeout, ReturnCode::Timeout, "Connection timeout to Eureka server"),
            (FetchFailure::ConnectionRefused, ReturnCode::ServiceDown, "Cannot connect to Eureka server"),
            (FetchFailure::UnknownHost, ReturnCode::InvalidHost, "Unknown host in Eureka URL"),
            (FetchFailure::Protocol, ReturnCode::ServiceUnavailable, "Service is currently not responding"),
            (FetchFailure::Other, ReturnCode::Unknown, "Cannot connect to Eureka server"),
        ];

        for (failure, code, prefix) in cases {
            let err = failure.into_error(url, anyhow::anyhow!("cause"));
            assert_eq!(err.return_code(), code, "{:?}", failure);
            assert_eq!(err.to_string(), format!("{}: {}", prefix, url));
        }
    }

    #[tokio::test]
    async fn test_fetches_document() {
        let app = Router::new().route(
            "/eureka/apps",
            get(|| async { Json(json!({"applications": {"application": []}})) }),
        );
        let addr = serve(app).await;

        let doc = fetcher(2_000)
            .fetch_applications(&format!("http://{}/eureka/", addr))
            .await
            .unwrap();

        assert_eq!(doc, Some(json!({"applications": {"application": []}})));
    }

    #[tokio::test]
    async fn test_null_and_empty_bodies_are_no_document() {
        let app = Router::new()
            .route("/null/apps", get(|| async { "null" }))
            .route("/empty/apps", get(|| async { "" }));
        let addr = serve(app).await;
        let fetcher = fetcher(2_000);

        let doc = fetcher.fetch_applications(&format!("http://{}/null", addr)).await.unwrap();
        assert_eq!(doc, None);

        let doc = fetcher.fetch_applications(&format!("http://{}/empty", addr)).await.unwrap();
        assert_eq!(doc, None);
    }

    #[tokio::test]
    async fn test_error_status_is_service_unavailable() {
        let app = Router::new().route(
            "/eureka/apps",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "down for maintenance") }),
        );
        let addr = serve(app).await;
        let base = format!("http://{}/eureka", addr);

        let err = classified(fetcher(2_000).fetch_applications(&base).await.unwrap_err());

        assert_eq!(err.return_code(), ReturnCode::ServiceUnavailable);
        assert!(err.to_string().contains(&base));
    }

    #[tokio::test]
    async fn test_invalid_json_is_service_unavailable() {
        let app = Router::new().route("/eureka/apps", get(|| async { "<applications/>" }));
        let addr = serve(app).await;

        let err = classified(
            fetcher(2_000)
                .fetch_applications(&format!("http://{}/eureka", addr))
                .await
                .unwrap_err(),
        );

        assert_eq!(err.return_code(), ReturnCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_slow_registry_times_out() {
        let app = Router::new().route(
            "/eureka/apps",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let addr = serve(app).await;
        let base = format!("http://{}/eureka", addr);

        let err = classified(fetcher(200).fetch_applications(&base).await.unwrap_err());

        assert_eq!(err.return_code(), ReturnCode::Timeout);
        assert!(err.to_string().contains(&base));
    }

    #[tokio::test]
    async fn test_refused_connection_is_service_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = classified(
            fetcher(2_000)
                .fetch_applications(&format!("http://{}/eureka", addr))
                .await
                .unwrap_err(),
        );

        assert_eq!(err.return_code(), ReturnCode::ServiceDown);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_invalid_host() {
        let base = "http://no-such-host.invalid/eureka";

        let err = classified(fetcher(5_000).fetch_applications(base).await.unwrap_err());

        assert_eq!(err.return_code(), ReturnCode::InvalidHost);
        assert!(err.to_string().contains(base));
    }
}
