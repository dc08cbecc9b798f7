use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use futures::FutureExt;
use reqwest::Url;
use shared::protocol::QueryResponse;
use shared::types::GroupedView;
use crate::error::QueryError;
use crate::registry::RegistryFetcher;
use crate::strategy::GroupBy;

/// Entry point of a grouped registry query: validates the target URL,
/// runs the selected strategy and wraps the outcome in an envelope.
pub struct QueryService<F> {
    fetcher: F,
}

impl<F: RegistryFetcher> QueryService<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Run one query. Classified errors come back unchanged; a panic
    /// below this point becomes a `Grouping` error naming the
    /// transaction and the time spent.
    pub async fn handle(
        &self,
        group_by: Option<&str>,
        target_url: &str,
        transaction_id: &str,
    ) -> Result<QueryResponse, QueryError> {
        let started = Instant::now();
        tracing::info!("Starting Eureka query - GroupBy: {:?}, URL: {}", group_by, target_url);

        let outcome = AssertUnwindSafe(self.run(group_by, target_url))
            .catch_unwind()
            .await;
        let elapsed = elapsed_ms(started);

        match outcome {
            Ok(Ok(data)) => {
                tracing::info!("Eureka query completed successfully in {:.3} ms", elapsed);
                Ok(QueryResponse::success(transaction_id, elapsed, data))
            }
            Ok(Err(err)) => {
                tracing::warn!("Handled API error after {:.3} ms: {}", elapsed, err);
                Err(err)
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                tracing::error!("Eureka query failed after {:.3} ms: {}", elapsed, cause);
                Err(QueryError::grouping(
                    format!("Eureka query [{}] failed after {} ms", transaction_id, elapsed as u64),
                    cause,
                ))
            }
        }
    }

    async fn run(&self, group_by: Option<&str>, target_url: &str) -> Result<GroupedView, QueryError> {
        validate_eureka_url(target_url)?;

        let strategy = GroupBy::resolve(group_by);
        tracing::debug!("Grouping by {}", strategy.name());
        strategy.group(&self.fetcher, target_url).await
    }
}

/// A Eureka base URL must be http(s), have a host, and point somewhere
/// under `/eureka`.
pub fn validate_eureka_url(url: &str) -> Result<Url, QueryError> {
    let uri = Url::parse(url)
        .map_err(|_| QueryError::invalid(format!("Invalid URL format: {}", url)))?;

    if !matches!(uri.scheme(), "http" | "https") {
        return Err(QueryError::invalid("Eureka URL must start with http:// or https://"));
    }

    if uri.host_str().map_or(true, str::is_empty) {
        return Err(QueryError::invalid("Eureka URL must contain a valid host."));
    }

    if !uri.path().contains("/eureka") {
        return Err(QueryError::invalid(
            "Eureka URL must contain the '/eureka' path segment.",
        ));
    }

    Ok(uri)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
