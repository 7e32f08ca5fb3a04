use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of entity an alert describes, as understood by the management plane.
///
/// Disks are reported as `system` alerts; the mount point is carried in the
/// metric name instead.
///
/// # Examples
///
/// ```
/// use nodewatch_common::types::EntityType;
///
/// let t: EntityType = "tenant".parse().unwrap();
/// assert_eq!(t, EntityType::Tenant);
/// assert_eq!(t.to_string(), "tenant");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    System,
    Process,
    Tenant,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::System => write!(f, "system"),
            EntityType::Process => write!(f, "process"),
            EntityType::Tenant => write!(f, "tenant"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(EntityType::System),
            "process" => Ok(EntityType::Process),
            "tenant" => Ok(EntityType::Tenant),
            _ => Err(format!("unknown entity type: {s}")),
        }
    }
}

/// Action recommended to the management plane alongside an alert.
///
/// Only [`Action::Notify`] is produced today; the others are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Notify,
    Start,
    Stop,
    Restart,
}

/// Structured alert payload handed to a notification sink.
///
/// Field names on the wire are kebab-case to match what the management
/// plane already accepts from older watchdog builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlertEvent {
    #[serde(rename = "monitor-type")]
    pub entity_type: EntityType,
    pub node_id: String,
    /// Serialized as RFC 3339.
    #[serde(rename = "time-stamp")]
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub message: String,
    #[serde(rename = "actions")]
    pub recommended_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default, rename = "s3-dns", skip_serializing_if = "Option::is_none")]
    pub tenant_dns: Option<String>,
}

impl AlertEvent {
    /// Builds a notify-only event stamped with the current time.
    pub fn notify(
        entity_type: EntityType,
        node_id: &str,
        metric_name: &str,
        metric_value: f64,
        threshold: f64,
        message: String,
    ) -> Self {
        Self {
            entity_type,
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
            metric_name: metric_name.to_string(),
            metric_value,
            threshold,
            message,
            recommended_actions: vec![Action::Notify],
            process_name: None,
            process_id: None,
            tenant_dns: None,
        }
    }

    pub fn with_process(mut self, name: &str, pid: u32) -> Self {
        self.process_name = Some(name.to_string());
        self.process_id = Some(pid);
        self
    }

    pub fn with_tenant(mut self, dns: &str) -> Self {
        self.tenant_dns = Some(dns.to_string());
        self
    }
}

/// Opaque credential material carried by a directory record.
///
/// The watchdog never decrypts it; `Debug` is redacted so it cannot leak
/// into logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    #[serde(rename = "CString", default)]
    pub cipher_text: String,
}

impl std::fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialRef(<redacted>)")
    }
}

/// A tenant assigned to this node by the tenant directory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantIdentity {
    pub dns: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(rename = "Password", default)]
    pub credentials: CredentialRef,
    #[serde(default)]
    pub compression: bool,
    #[serde(rename = "MaxApiRequests", default)]
    pub max_api_requests: i64,
    #[serde(rename = "ApiRequestsDeadline", default)]
    pub api_requests_deadline: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub whitelist: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub blacklist: Vec<String>,
}

impl TenantIdentity {
    /// A record carrying only a dns name; mostly useful in tests.
    pub fn with_dns(dns: &str) -> Self {
        Self {
            dns: dns.to_string(),
            user_id: String::new(),
            credentials: CredentialRef::default(),
            compression: false,
            max_api_requests: 0,
            api_requests_deadline: 0,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// What the local process supervisor believes about one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorRecord {
    #[serde(rename = "DNS")]
    pub dns: String,
    #[serde(rename = "ProcessID")]
    pub expected_process_id: u32,
    #[serde(rename = "PlannedRestart", default)]
    pub planned_restart: bool,
    #[serde(rename = "MarkedForForceRestart", default)]
    pub force_restart: bool,
    #[serde(rename = "FailedS3HealthChecks", default)]
    pub failed_health_checks: u32,
    #[serde(rename = "ProcessStartTime", default)]
    pub process_start_time: String,
}

impl SupervisorRecord {
    pub fn new(dns: &str, expected_process_id: u32) -> Self {
        Self {
            dns: dns.to_string(),
            expected_process_id,
            planned_restart: false,
            force_restart: false,
            failed_health_checks: 0,
            process_start_time: String::new(),
        }
    }
}

/// One row of the OS process table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveProcess {
    pub process_id: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub connection_count: u64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
