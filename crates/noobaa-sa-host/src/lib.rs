pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod provision;
pub mod readiness;
pub mod templating;

use rpm_core::ArtifactSource;

pub use config::{ConfigLoader, Settings};
pub use context::{BackingStores, ProvisioningContext, Variant, detect_ip_address};
pub use error::{DeployError, Result};
pub use exec::{CommandOutput, CommandRunner, HostCommand, SystemRunner};
pub use provision::{Action, HealthCheck, Plan, Script, Sequencer, Step};
pub use readiness::Readiness;

/// Build the plan for the context's variant and run it to completion.
pub fn deploy(
    ctx: &ProvisioningContext,
    runner: &dyn CommandRunner,
    source: &dyn ArtifactSource,
) -> Result<()> {
    let plan = Plan::for_context(ctx);
    Sequencer::new(ctx, runner, source).run(&plan)
}
