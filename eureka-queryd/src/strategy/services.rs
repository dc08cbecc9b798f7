use std::slice;
use serde_json::Value;
use shared::types::{ServerInstance, ServerInstanceDetail, ServiceDetail, ServiceGroup, ServiceView};
use crate::error::QueryError;
use crate::mapper;
use crate::registry::RegistryFetcher;
use super::{applications, fetch_document, non_blank};

const UNKNOWN_HOST: &str = "unknown-host";

/// Group every registered instance under its application name.
pub async fn group_by_services<F: RegistryFetcher>(
    fetcher: &F,
    base_url: &str,
) -> Result<ServiceView, QueryError> {
    tracing::debug!("Grouping services for Eureka server {}", base_url);

    let document = fetch_document(fetcher, base_url, "service").await?;
    let view = group_services(&document)?;

    if view.services.is_empty() {
        tracing::info!("Eureka server {} has no applications", base_url);
    } else {
        tracing::info!("Grouped {} services from {}", view.services.len(), base_url);
    }
    Ok(view)
}

/// Service-keyed projection of an already fetched registry document.
///
/// More permissive than the host projection: a lone instance object that
/// the registry did not wrap in an array counts as a one-element list.
pub fn group_services(document: &Value) -> Result<ServiceView, QueryError> {
    let mut services = Vec::new();

    for app in applications(document) {
        if let Some(group) = service_group(app)? {
            services.push(group);
        }
    }

    Ok(ServiceView { services })
}

fn service_group(app: &Value) -> Result<Option<ServiceGroup>, QueryError> {
    let Some(service_name) = non_blank(app, "name") else {
        tracing::warn!("Application name empty, skipping");
        return Ok(None);
    };

    let instances = match app.get("instance") {
        None | Some(Value::Null) => {
            tracing::debug!("Service {} has no instances", service_name);
            return Ok(None);
        }
        Some(Value::Array(instances)) => instances.as_slice(),
        Some(lone) => slice::from_ref(lone),
    };

    let servers = instances
        .iter()
        .map(server_instance)
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        tracing::debug!("Service {} has no mappable instances", service_name);
        return Ok(None);
    }

    Ok(Some(ServiceGroup {
        service: ServiceDetail {
            service_name: service_name.to_string(),
            servers,
        },
    }))
}

fn server_instance(instance: &Value) -> Result<ServerInstance, QueryError> {
    let hostname = host_identifier(instance);

    let detail = mapper::map_instance(instance).map_err(|defect| {
        let instance_id = non_blank(instance, "instanceId").unwrap_or("unknown");
        tracing::warn!("Error mapping instance {}: {}", instance_id, defect);
        QueryError::InstanceMapping {
            message: format!("Failed to map instance: {}", instance_id),
            source: Some(defect.into()),
        }
    })?;

    Ok(ServerInstance {
        server: ServerInstanceDetail {
            hostname,
            instance_detail: detail,
        },
    })
}

/// `hostName`, then `ipAddr`, then `instanceId`, then "unknown-host".
pub fn host_identifier(instance: &Value) -> String {
    if let Some(host) = non_blank(instance, "hostName").or_else(|| non_blank(instance, "ipAddr")) {
        return host.to_string();
    }

    let fallback = non_blank(instance, "instanceId").unwrap_or(UNKNOWN_HOST);
    tracing::warn!("No hostName/ipAddr, using {}", fallback);
    fallback.to_string()
}
