use serde_json::{Map, Value};
use shared::types::{InstanceDetail, LeaseInfo, Metadata};
use thiserror::Error;

const METADATA_KEY: &str = "metadata";
const LEASE_INFO_KEY: &str = "leaseInfo";

/// Structural problems the mapping step refuses to paper over.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingDefect {
    #[error("instance record must be an object, found {0}")]
    NotAnObject(&'static str),
    #[error("instance field `{field}` must be an object, found {found}")]
    FieldNotAnObject {
        field: &'static str,
        found: &'static str,
    },
}

/// Check an instance node's shape, then normalize it.
pub fn map_instance(node: &Value) -> Result<InstanceDetail, MappingDefect> {
    if !node.is_object() {
        return Err(MappingDefect::NotAnObject(kind_of(node)));
    }

    for field in [METADATA_KEY, LEASE_INFO_KEY] {
        match node.get(field) {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(other) => {
                return Err(MappingDefect::FieldNotAnObject {
                    field,
                    found: kind_of(other),
                })
            }
        }
    }

    Ok(normalize(node))
}

/// Convert one raw instance record into an `InstanceDetail`.
///
/// Total over its input: unparsable scalars fall back to defaults and
/// missing sub-records come back as `None`.
pub fn normalize(node: &Value) -> InstanceDetail {
    InstanceDetail {
        ip_addr: text(node.get("ipAddr")).unwrap_or_default(),
        port: parse_port(node.get("port")),
        secure_port: parse_port(node.get("securePort")),
        health_check_url: text(node.get("healthCheckUrl")),
        home_page_url: text(node.get("homePageUrl")),
        status_page_url: text(node.get("statusPageUrl")),
        status: text(node.get("status")).unwrap_or_default(),
        last_updated_timestamp: parse_i64(node.get("lastUpdatedTimestamp")),
        last_dirty_timestamp: parse_i64(node.get("lastDirtyTimestamp")),
        is_coordinating_discovery_server: parse_flag(node.get("isCoordinatingDiscoveryServer")),
        metadata_map: sub_record(node, METADATA_KEY).map(map_metadata),
        lease_info: sub_record(node, LEASE_INFO_KEY).map(map_lease_info),
    }
}

/// Accepts `8080`, `"8080"` and `{"$": 8080}` (or `{"$": "8080"}`).
pub fn parse_port(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Object(obj)) => obj.get("$").map(port_scalar).unwrap_or(0),
        Some(other) => port_scalar(other),
        None => 0,
    }
}

fn port_scalar(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Integer or numeric string; anything else is 0.
pub fn parse_i64(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn parse_u32(value: Option<&Value>) -> u32 {
    u32::try_from(parse_i64(value)).unwrap_or(0)
}

/// `true`, `false`, or the literal strings "true"/"false".
pub fn parse_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim() == "true",
        _ => false,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn sub_record<'a>(node: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    node.get(key).and_then(Value::as_object)
}

fn map_metadata(obj: &Map<String, Value>) -> Metadata {
    Metadata {
        version: text(obj.get("version")),
        region: text(obj.get("region")),
        zone: text(obj.get("zone")),
        instance_type: text(obj.get("instanceType")),
        build_number: text(obj.get("buildNumber")),
    }
}

fn map_lease_info(obj: &Map<String, Value>) -> LeaseInfo {
    LeaseInfo {
        renewal_interval_in_secs: parse_u32(obj.get("renewalIntervalInSecs")),
        duration_in_secs: parse_u32(obj.get("durationInSecs")),
        registration_timestamp: parse_i64(obj.get("registrationTimestamp")),
        last_renewal_timestamp: parse_i64(obj.get("lastRenewalTimestamp")),
        eviction_timestamp: parse_i64(obj.get("evictionTimestamp")),
        service_up_timestamp: parse_i64(obj.get("serviceUpTimestamp")),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
