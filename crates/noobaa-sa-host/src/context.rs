use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use rpm_core::{ArtifactPattern, Credentials, RpmSettings};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, EnvData, ReadinessMode, RunSettings};
use crate::error::{DeployError, Result};
use crate::readiness::Readiness;

const DEFAULT_TEMPLATE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates");
// TEST-NET-1; never routed, only used to pick the outbound interface.
const ROUTE_PROBE: &str = "192.0.2.1:80";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Filesystem-backed deployment driven by the packaged systemd unit.
    Nsfs,
    /// Database-backed deployment with every service started by hand.
    Db,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nsfs => "nsfs",
            Self::Db => "db",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackingStores {
    pub count: u32,
    pub base_port: u16,
    pub root: PathBuf,
    pub prefix: String,
}

impl BackingStores {
    /// Drive directories and their ports. Drive `n` lives in
    /// `root/<prefix>n` and listens on `base_port + n + 1`.
    pub fn drives(&self) -> impl Iterator<Item = (PathBuf, u16)> + '_ {
        (0..self.count).map(move |num| {
            let path = self.root.join(format!("{}{num}", self.prefix));
            // Range checked when the context is built.
            let port = self.base_port.saturating_add(1).saturating_add(num as u16);
            (path, port)
        })
    }
}

/// Everything one deployment run needs. Built once, then only borrowed.
#[derive(Clone, Debug)]
pub struct ProvisioningContext {
    pub variant: Variant,
    pub rpm: RpmSettings,
    pub env: EnvData,
    pub backing_stores: BackingStores,
    pub run: RunSettings,
    pub template_dir: PathBuf,
    pub ip_address: String,
    /// `ENV_DATA` plus host-derived values; the env-file template context.
    pub template_values: Value,
}

impl ProvisioningContext {
    pub fn build(loader: &ConfigLoader, variant: Variant) -> Result<Self> {
        let settings = loader.settings()?;
        let deployment = settings.deployment;
        let env = settings.env_data;

        let pattern = ArtifactPattern::compile(
            &deployment.rpm_pattern,
            &deployment.rpm_rhel_version,
            &deployment.rpm_arch,
        )?;
        let credentials = match (
            deployment.rpm_auth_username.as_deref(),
            deployment.rpm_auth_password.as_deref(),
        ) {
            (Some(user), Some(pass)) if !user.is_empty() => Some(Credentials::new(user, pass)),
            (Some(user), None) if !user.is_empty() => Some(Credentials::new(user, "")),
            _ => None,
        };
        for (key, base) in [
            ("upstream_rpm_s3_base_url", &deployment.upstream_rpm_s3_base_url),
            ("downstream_rpm_base_url", &deployment.downstream_rpm_base_url),
        ] {
            if base.trim().is_empty() {
                return Err(DeployError::Config(format!(
                    "DEPLOYMENT.{key} must not be empty"
                )));
            }
        }
        let rpm = RpmSettings {
            override_url: env.override_url().map(str::to_string),
            upstream: deployment.upstream,
            upstream_base_url: deployment.upstream_rpm_s3_base_url,
            downstream_base_url: deployment.downstream_rpm_base_url,
            downstream_path: deployment.downstream_rpm_artifactory_path,
            package_family: deployment.package_family,
            pattern,
            credentials,
        };

        let last_port = u32::from(deployment.backing_store_drive_port) + deployment.backing_stores;
        if last_port > u32::from(u16::MAX) {
            return Err(DeployError::Config(format!(
                "{} backing stores starting after port {} exceed the port range",
                deployment.backing_stores, deployment.backing_store_drive_port
            )));
        }
        let backing_stores = BackingStores {
            count: deployment.backing_stores,
            base_port: deployment.backing_store_drive_port,
            root: deployment.backing_store_drive_path,
            prefix: deployment.backing_store_drive_prefix,
        };

        let template_dir = env
            .template_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR));
        let ip_address = match env.ip_address.as_deref().map(str::trim) {
            Some(ip) if !ip.is_empty() => ip.to_string(),
            _ => detect_ip_address().to_string(),
        };

        let mut template_values = loader
            .section("ENV_DATA")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        if let Value::Object(values) = &mut template_values {
            values.insert("ip_address".to_string(), Value::String(ip_address.clone()));
            values.insert(
                "template_dir".to_string(),
                Value::String(template_dir.display().to_string()),
            );
        }

        info!(%variant, channel = %rpm.channel(), %ip_address, "provisioning context ready");
        Ok(Self {
            variant,
            rpm,
            env,
            backing_stores,
            run: settings.run,
            template_dir,
            ip_address,
            template_values,
        })
    }

    /// Storage directory; relative paths live under the core directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.env.noobaa_core_dir.join(&self.env.storage_dir)
    }

    pub fn node_path(&self) -> PathBuf {
        self.env.noobaa_core_dir.join(&self.env.node_rel_path)
    }

    /// Directory holding `package.json`; npm scripts run from here.
    pub fn package_dir(&self) -> PathBuf {
        self.env
            .package_json
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.env.noobaa_core_dir.clone())
    }

    pub fn readiness(&self, target: &str, port: Option<u16>) -> Readiness {
        match (self.run.readiness, port) {
            (ReadinessMode::Tcp, Some(port)) => Readiness::Tcp {
                target: target.to_string(),
                addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
                attempts: self.run.readiness_attempts,
                interval: self.run.readiness_interval,
            },
            _ => Readiness::FixedDelay(self.run.service_start_delay),
        }
    }
}

/// Address of the interface that would carry outbound traffic. No packet is
/// sent; connecting a UDP socket only performs the route lookup.
pub fn detect_ip_address() -> IpAddr {
    let route_lookup = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(ROUTE_PROBE)?;
        Ok(socket.local_addr()?.ip())
    };
    match route_lookup() {
        Ok(ip) if !ip.is_unspecified() => {
            debug!(%ip, "detected host address");
            ip
        }
        Ok(_) => {
            warn!("route lookup returned an unspecified address, using 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(err) => {
            warn!(error = %err, "failed to detect host address, using 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpm_core::Channel;
    use std::time::Duration;

    fn loader(extra: &str) -> ConfigLoader {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str("ENV_DATA:\n  ip_address: 10.1.2.3\n", "test")
            .unwrap();
        loader.merge_str(extra, "extra").unwrap();
        loader
    }

    #[test]
    fn drives_start_one_above_the_base_port() {
        let stores = BackingStores {
            count: 3,
            base_port: 9990,
            root: PathBuf::from("/drives"),
            prefix: "drive".to_string(),
        };
        let drives: Vec<_> = stores.drives().collect();
        assert_eq!(
            drives,
            vec![
                (PathBuf::from("/drives/drive0"), 9991),
                (PathBuf::from("/drives/drive1"), 9992),
                (PathBuf::from("/drives/drive2"), 9993),
            ]
        );
    }

    #[test]
    fn build_collects_settings_and_host_values() {
        let ctx = ProvisioningContext::build(&loader(""), Variant::Db).unwrap();
        assert_eq!(ctx.ip_address, "10.1.2.3");
        assert_eq!(ctx.rpm.channel(), Channel::Downstream);
        assert!(ctx.rpm.credentials.is_none());
        assert_eq!(ctx.rpm.pattern.platform_tag(), "el9");
        assert_eq!(
            ctx.storage_dir(),
            PathBuf::from("/usr/local/noobaa-core/noobaa_storage")
        );
        assert_eq!(
            ctx.node_path(),
            PathBuf::from("/usr/local/noobaa-core/node/bin/node")
        );
        assert_eq!(ctx.package_dir(), PathBuf::from("/usr/local/noobaa-core"));
        assert_eq!(ctx.template_values["ip_address"], "10.1.2.3");
        assert_eq!(ctx.template_values["postgres_dbname"], "nbcore");
        assert!(ctx.template_values["template_dir"].is_string());
    }

    #[test]
    fn credentials_come_from_deployment_section() {
        let ctx = ProvisioningContext::build(
            &loader("DEPLOYMENT:\n  rpm_auth_username: ci\n  rpm_auth_password: secret\n"),
            Variant::Nsfs,
        )
        .unwrap();
        let creds = ctx.rpm.credentials.as_ref().unwrap();
        assert_eq!(creds.username, "ci");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn port_overflow_is_rejected() {
        let err = ProvisioningContext::build(
            &loader("DEPLOYMENT:\n  backing_store_drive_port: 65530\n  backing_stores: 10\n"),
            Variant::Db,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }

    #[test]
    fn empty_base_urls_are_rejected() {
        for key in ["upstream_rpm_s3_base_url", "downstream_rpm_base_url"] {
            let err = ProvisioningContext::build(
                &loader(&format!("DEPLOYMENT:\n  {key}: ''\n")),
                Variant::Nsfs,
            )
            .unwrap_err();
            match err {
                DeployError::Config(msg) => assert!(msg.contains(key), "{msg}"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn bad_pattern_surfaces_as_artifact_error() {
        let err = ProvisioningContext::build(
            &loader("DEPLOYMENT:\n  rpm_pattern: 'noobaa-(\\.{arch}'\n"),
            Variant::Db,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::Artifact(_)));
    }

    #[test]
    fn readiness_falls_back_to_delay_without_port() {
        let ctx = ProvisioningContext::build(
            &loader("RUN:\n  readiness: tcp\n  service_start_delay: 3s\n"),
            Variant::Db,
        )
        .unwrap();
        assert_eq!(
            ctx.readiness("bg", None),
            Readiness::FixedDelay(Duration::from_secs(3))
        );
        assert!(matches!(
            ctx.readiness("web", Some(8080)),
            Readiness::Tcp { addr, .. } if addr.port() == 8080
        ));
    }

    #[test]
    fn detected_address_is_never_unspecified() {
        assert!(!detect_ip_address().is_unspecified());
    }
}
