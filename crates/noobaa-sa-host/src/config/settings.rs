use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Typed view over the merged configuration document. Sections without a
/// typed counterpart (`REPORTING`, `UPGRADE`) stay reachable through
/// [`super::ConfigLoader::section`].
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    #[serde(rename = "DEPLOYMENT")]
    pub deployment: DeploymentSettings,
    #[serde(rename = "ENV_DATA")]
    pub env_data: EnvData,
    #[serde(rename = "RUN")]
    pub run: RunSettings,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeploymentSettings {
    pub upstream: bool,
    pub upstream_rpm_s3_base_url: String,
    pub downstream_rpm_base_url: String,
    pub downstream_rpm_artifactory_path: String,
    #[serde(default)]
    pub rpm_auth_username: Option<String>,
    #[serde(default)]
    pub rpm_auth_password: Option<String>,
    pub package_family: String,
    pub rpm_pattern: String,
    #[serde(deserialize_with = "string_or_number")]
    pub rpm_rhel_version: String,
    pub rpm_arch: String,
    pub backing_stores: u32,
    pub backing_store_drive_port: u16,
    pub backing_store_drive_path: PathBuf,
    pub backing_store_drive_prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnvData {
    #[serde(default)]
    pub noobaa_sa: Option<String>,
    pub noobaa_core_dir: PathBuf,
    pub noobaa_conf_dir: PathBuf,
    pub nsfs_env: PathBuf,
    pub nsfs_service: String,
    pub bin_dir: PathBuf,
    pub node_cmd: String,
    pub node_rel_path: PathBuf,
    pub postgres_repo: String,
    #[serde(deserialize_with = "string_or_number")]
    pub postgresql_version: String,
    pub db_packages: Vec<String>,
    pub postgresql_dir: PathBuf,
    pub package_json: PathBuf,
    pub storage_dir: PathBuf,
    pub env_file: PathBuf,
    pub env_template: String,
    pub config_local: PathBuf,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    pub postgres_port: u16,
    pub web_port: u16,
    pub s3_port: u16,
}

impl EnvData {
    /// `noobaa_sa`, ignoring an empty string.
    pub fn override_url(&self) -> Option<&str> {
        self.noobaa_sa
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Sleep a fixed time after each asynchronously started service.
    Fixed,
    /// Poll the service's TCP port where it has one.
    Tcp,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunSettings {
    pub log_level: String,
    pub use_sudo: bool,
    #[serde(deserialize_with = "human_duration")]
    pub command_timeout: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub http_timeout: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub service_start_delay: Duration,
    pub readiness: ReadinessMode,
    pub readiness_attempts: u32,
    #[serde(deserialize_with = "human_duration")]
    pub readiness_interval: Duration,
    pub download_dir: PathBuf,
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw)
        .map_err(|err| serde::de::Error::custom(format!("invalid duration `{raw}`: {err}")))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
    })
}
