use serde::{Deserialize, Serialize};

/// Canonical view of one registered instance, normalized from the
/// registry's loosely-typed instance record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetail {
    pub ip_addr: String,
    /// Non-negative ports only; negative or fractional values become 0
    pub port: u32,
    pub secure_port: u32,
    pub health_check_url: Option<String>,
    pub home_page_url: Option<String>,
    pub status_page_url: Option<String>,
    pub status: String,
    pub last_updated_timestamp: i64,
    pub last_dirty_timestamp: i64,
    pub is_coordinating_discovery_server: bool,
    /// `None` when the registry sent no metadata at all
    pub metadata_map: Option<Metadata>,
    /// `None` when the registry sent no lease info at all
    pub lease_info: Option<LeaseInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub instance_type: Option<String>,
    pub build_number: Option<String>,
}

/// Registry-side lease bookkeeping for an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseInfo {
    /// Seconds between client renewals
    pub renewal_interval_in_secs: u32,
    /// Total lease duration in seconds
    pub duration_in_secs: u32,
    pub registration_timestamp: i64,
    pub last_renewal_timestamp: i64,
    pub eviction_timestamp: i64,
    /// When the instance was marked UP
    pub service_up_timestamp: i64,
}

// ---- grouped by host ----

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerView {
    pub servers: Vec<ServerGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroup {
    pub server: ServerDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDetail {
    pub host_name: String,
    pub services: Vec<ServiceInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service: ServiceInstanceDetail,
}

/// A service running on a host. The instance fields sit next to
/// `serviceName` on the wire rather than under a nested key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceDetail {
    pub service_name: String,
    #[serde(flatten)]
    pub instance_detail: InstanceDetail,
}

// ---- grouped by service ----

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceView {
    pub services: Vec<ServiceGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub service: ServiceDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    pub service_name: String,
    pub servers: Vec<ServerInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstance {
    pub server: ServerInstanceDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstanceDetail {
    pub hostname: String,
    pub instance_detail: InstanceDetail,
}

/// Either projection of the registry. Consumers tell them apart by
/// whether `servers` or `services` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupedView {
    Servers(ServerView),
    Services(ServiceView),
}

impl From<ServerView> for GroupedView {
    fn from(view: ServerView) -> Self {
        GroupedView::Servers(view)
    }
}

impl From<ServiceView> for GroupedView {
    fn from(view: ServiceView) -> Self {
        GroupedView::Services(view)
    }
}
