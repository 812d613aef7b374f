//! Layered YAML configuration.
//!
//! The built-in defaults are the bottom layer; every `--conf` file is
//! deep-merged on top in the order given. Mappings merge key by key, any
//! other value replaces what was there.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use serde_yaml_bw as serde_yaml;
use tracing::debug;

use crate::error::{DeployError, Result};

pub mod settings;

pub use settings::{DeploymentSettings, EnvData, ReadinessMode, RunSettings, Settings};

const DEFAULT_CONFIG: &str = include_str!("default_config.yaml");

pub const SECTIONS: [&str; 5] = ["DEPLOYMENT", "ENV_DATA", "REPORTING", "RUN", "UPGRADE"];

/// `(section, key)` pairs masked whenever the document is printed.
const SECRET_KEYS: [(&str, &str); 1] = [("DEPLOYMENT", "rpm_auth_password")];
const REDACTED: &str = "<redacted>";

#[derive(Clone, Debug)]
pub struct ConfigLoader {
    document: Value,
}

impl ConfigLoader {
    /// Start from the built-in defaults.
    pub fn new() -> Result<Self> {
        let mut loader = Self {
            document: Value::Object(Map::new()),
        };
        loader.merge_str(DEFAULT_CONFIG, "built-in defaults")?;
        Ok(loader)
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path).map_err(|err| DeployError::io(path, err))?;
        self.merge_str(&raw, &path.display().to_string())
    }

    pub fn merge_str(&mut self, raw: &str, origin: &str) -> Result<()> {
        if raw.trim().is_empty() {
            return Ok(());
        }
        let layer: Value = serde_yaml::from_str(raw)
            .map_err(|err| DeployError::Config(format!("{origin}: {err}")))?;
        let sections = match layer {
            Value::Object(sections) => sections,
            Value::Null => return Ok(()),
            _ => {
                return Err(DeployError::Config(format!(
                    "{origin}: top level must be a mapping of sections"
                )));
            }
        };
        for (name, value) in sections {
            if !SECTIONS.contains(&name.as_str()) {
                return Err(DeployError::Config(format!(
                    "{origin}: `{name}` is not a valid config section. Valid sections: {}",
                    SECTIONS.join(", ")
                )));
            }
            if value.is_null() {
                continue;
            }
            debug!(origin, section = %name, "merging config section");
            let document = self
                .document
                .as_object_mut()
                .ok_or_else(|| DeployError::Config("config root is not a mapping".to_string()))?;
            let slot = document
                .entry(name)
                .or_insert_with(|| Value::Object(Map::new()));
            deep_merge(slot, value);
        }
        Ok(())
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    pub fn settings(&self) -> Result<Settings> {
        serde_json::from_value(self.document.clone())
            .map_err(|err| DeployError::Config(err.to_string()))
    }

    /// Render the merged document with secrets masked.
    pub fn to_yaml(&self) -> Result<String> {
        let mut document = self.document.clone();
        for (section, key) in SECRET_KEYS {
            if let Some(slot) = document.get_mut(section).and_then(|s| s.get_mut(key)) {
                if !slot.is_null() {
                    *slot = Value::String(REDACTED.to_string());
                }
            }
        }
        serde_yaml::to_string(&document).map_err(|err| DeployError::Config(err.to_string()))
    }
}

fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn defaults_deserialize() {
        let settings = ConfigLoader::new().unwrap().settings().unwrap();
        assert_eq!(settings.deployment.rpm_rhel_version, "el9");
        assert_eq!(settings.deployment.backing_store_drive_port, 9990);
        assert_eq!(settings.run.command_timeout, Duration::from_secs(600));
        assert_eq!(settings.run.service_start_delay, Duration::from_secs(10));
        assert_eq!(settings.run.readiness, ReadinessMode::Fixed);
        assert!(settings.env_data.override_url().is_none());
    }

    #[test]
    fn nested_mappings_merge_and_scalars_replace() {
        let mut base = json!({"a": {"x": 1, "y": [1, 2]}, "b": 1});
        deep_merge(&mut base, json!({"a": {"y": [3], "z": true}, "b": {"c": 2}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": [3], "z": true}, "b": {"c": 2}}));
    }

    #[test]
    fn later_layers_win() {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str("DEPLOYMENT:\n  backing_stores: 5\n  rpm_arch: aarch64\n", "first")
            .unwrap();
        loader
            .merge_str("DEPLOYMENT:\n  backing_stores: 2\n", "second")
            .unwrap();
        let settings = loader.settings().unwrap();
        assert_eq!(settings.deployment.backing_stores, 2);
        assert_eq!(settings.deployment.rpm_arch, "aarch64");
        assert_eq!(settings.deployment.package_family, "noobaa-core");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let mut loader = ConfigLoader::new().unwrap();
        let err = loader.merge_str("CLUSTER:\n  a: 1\n", "custom.yaml").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`CLUSTER` is not a valid config section"));
        assert!(msg.contains("custom.yaml"));
    }

    #[test]
    fn null_sections_and_empty_files_are_skipped() {
        let mut loader = ConfigLoader::new().unwrap();
        loader.merge_str("", "empty.yaml").unwrap();
        loader.merge_str("RUN:\n", "null.yaml").unwrap();
        assert_eq!(loader.settings().unwrap().run.log_level, "info");
    }

    #[test]
    fn numeric_versions_are_accepted() {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str("ENV_DATA:\n  postgresql_version: 16\n", "override")
            .unwrap();
        assert_eq!(loader.settings().unwrap().env_data.postgresql_version, "16");
    }

    #[test]
    fn bad_duration_is_a_config_error() {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str("RUN:\n  command_timeout: soon\n", "override")
            .unwrap();
        assert!(matches!(loader.settings(), Err(DeployError::Config(_))));
    }

    #[test]
    fn printed_config_masks_the_rpm_password() {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str(
                "DEPLOYMENT:\n  rpm_auth_username: deployer\n  rpm_auth_password: hunter2\n",
                "secrets.yaml",
            )
            .unwrap();
        let yaml = loader.to_yaml().unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains(REDACTED));
        assert!(yaml.contains("deployer"));
        assert_eq!(
            loader.settings().unwrap().deployment.rpm_auth_password.as_deref(),
            Some("hunter2")
        );
    }

    #[test]
    fn unset_password_is_not_marked_redacted() {
        let yaml = ConfigLoader::new().unwrap().to_yaml().unwrap();
        assert!(!yaml.contains(REDACTED));
    }

    #[test]
    fn merge_file_reads_yaml_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("conf.yaml");
        fs::write(&path, "ENV_DATA:\n  noobaa_sa: http://x/noobaa-core.rpm\n").unwrap();
        let mut loader = ConfigLoader::new().unwrap();
        loader.merge_file(&path).unwrap();
        assert_eq!(
            loader.settings().unwrap().env_data.override_url(),
            Some("http://x/noobaa-core.rpm")
        );
    }
}
