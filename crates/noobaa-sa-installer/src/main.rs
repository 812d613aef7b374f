use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use noobaa_sa_host::{ConfigLoader, Plan, ProvisioningContext, SystemRunner, Variant, deploy};
use rpm_core::HttpSource;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "noobaa-sa-install", about = "Deploy NooBaa standalone on this host")]
#[command(group(ArgGroup::new("variant").required(true).args(["nsfs", "db"])))]
struct Cli {
    /// YAML config layered over the built-in defaults (repeatable, applied in order).
    #[arg(long = "conf", value_name = "PATH")]
    conf: Vec<PathBuf>,

    /// Filesystem-backed deployment.
    #[arg(long)]
    nsfs: bool,

    /// Database-backed deployment.
    #[arg(long)]
    db: bool,

    /// Print the resolved config and the step plan, then exit.
    #[arg(long)]
    explain: bool,

    /// Log filter, overrides RUST_LOG and RUN.log_level.
    #[arg(long = "log-level", value_name = "FILTER")]
    log_level: Option<String>,
}

impl Cli {
    fn variant(&self) -> Variant {
        if self.nsfs { Variant::Nsfs } else { Variant::Db }
    }
}

fn main() {
    let cli = Cli::parse();
    let loaded = load_config(&cli.conf);
    let config_level = loaded
        .as_ref()
        .ok()
        .and_then(|loader| loader.settings().ok())
        .map(|settings| settings.run.log_level);
    init_tracing(&log_filter(
        cli.log_level.as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
        config_level.as_deref(),
    ));

    if let Err(err) = loaded.and_then(|loader| run(&cli, &loader)) {
        error!(error = %format!("{err:#}"), "deployment failed");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, loader: &ConfigLoader) -> Result<()> {
    let ctx = ProvisioningContext::build(loader, cli.variant())
        .context("failed to build provisioning context")?;
    let plan = Plan::for_context(&ctx);

    if cli.explain {
        println!("{}", loader.to_yaml()?);
        print!("{plan}");
        return Ok(());
    }

    let source = HttpSource::new(ctx.run.http_timeout)?;
    deploy(&ctx, &SystemRunner, &source)?;
    info!(variant = %ctx.variant, "NooBaa standalone deployed");
    Ok(())
}

fn load_config(paths: &[PathBuf]) -> Result<ConfigLoader> {
    let mut loader = ConfigLoader::new()?;
    for path in paths {
        loader
            .merge_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
    }
    Ok(loader)
}

/// The first non-empty of the CLI flag, `RUST_LOG` and the configured level.
fn log_filter(cli: Option<&str>, env: Option<&str>, config: Option<&str>) -> String {
    [cli, env, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|level| !level.is_empty())
        .unwrap_or("info")
        .to_string()
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
