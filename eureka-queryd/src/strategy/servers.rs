use std::collections::BTreeMap;
use serde_json::Value;
use shared::types::{ServerDetail, ServerGroup, ServerView, ServiceInstance, ServiceInstanceDetail};
use crate::error::QueryError;
use crate::mapper;
use crate::registry::RegistryFetcher;
use super::{applications, fetch_document, non_blank};

/// Group every registered instance under the host it runs on.
pub async fn group_by_servers<F: RegistryFetcher>(
    fetcher: &F,
    base_url: &str,
) -> Result<ServerView, QueryError> {
    tracing::debug!("Starting server grouping for Eureka URL: {}", base_url);

    let document = fetch_document(fetcher, base_url, "server").await?;
    let view = group_servers(&document)?;

    tracing::info!("Grouped {} hosts from {}", view.servers.len(), base_url);
    Ok(view)
}

/// Host-keyed projection of an already fetched registry document.
///
/// Applications whose `instance` field is not an array are skipped, as
/// are instances without a `hostName`. A structurally broken instance
/// aborts the whole projection.
pub fn group_servers(document: &Value) -> Result<ServerView, QueryError> {
    let mut by_host: BTreeMap<String, Vec<ServiceInstance>> = BTreeMap::new();

    for app in applications(document) {
        let Some(service_name) = non_blank(app, "name") else {
            tracing::debug!("Skipping application with empty name");
            continue;
        };

        let Some(instances) = app.get("instance").and_then(Value::as_array) else {
            tracing::debug!("Service {} has no instance array", service_name);
            continue;
        };

        for instance in instances {
            add_instance(service_name, instance, &mut by_host)?;
        }
    }

    let servers = by_host
        .into_iter()
        .filter(|(host, services)| {
            if services.is_empty() {
                tracing::debug!("Host {} dropped, no valid services", host);
            }
            !services.is_empty()
        })
        .map(|(host_name, services)| ServerGroup {
            server: ServerDetail { host_name, services },
        })
        .collect();

    Ok(ServerView { servers })
}

fn add_instance(
    service_name: &str,
    instance: &Value,
    by_host: &mut BTreeMap<String, Vec<ServiceInstance>>,
) -> Result<(), QueryError> {
    let Some(host_name) = non_blank(instance, "hostName") else {
        tracing::debug!("Instance for service {} has empty hostname", service_name);
        return Ok(());
    };

    let detail = mapper::map_instance(instance).map_err(|defect| {
        tracing::warn!("Error mapping instance for service {}: {}", service_name, defect);
        QueryError::InstanceMapping {
            message: format!("Failed to map instance for service: {}", service_name),
            source: Some(defect.into()),
        }
    })?;

    by_host
        .entry(host_name.to_string())
        .or_default()
        .push(ServiceInstance {
            service: ServiceInstanceDetail {
                service_name: service_name.to_string(),
                instance_detail: detail,
            },
        });
    tracing::trace!("Added service {} to host {}", service_name, host_name);

    Ok(())
}
