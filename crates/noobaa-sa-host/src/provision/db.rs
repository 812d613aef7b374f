use super::{Action, HealthCheck, Script, Step};
use crate::context::ProvisioningContext;

const WORLD_RWX: &str = "777";
const CONFIG_LOCAL_TEMPLATE: &str = "config-local.js";

/// Database-backed deployment. Every service is launched by hand through
/// its npm script and followed by a readiness wait.
pub(super) fn steps(ctx: &ProvisioningContext) -> Vec<Step> {
    let env = &ctx.env;
    let delay = |target: &str| ctx.readiness(target, None);

    let mut steps = vec![
        Step::new("install noobaa-core", Action::InstallMainPackage),
        Step::new(
            "install postgresql repository",
            Action::InstallPackages(vec![env.postgres_repo.clone()]),
        ),
        Step::new(
            "enable postgresql module",
            Action::EnableModule(format!("postgresql:{}", env.postgresql_version)),
        ),
        Step::new(
            "install postgresql",
            Action::InstallPackages(env.db_packages.clone()),
        ),
        Step::new(
            "open noobaa-core directory",
            Action::Chmod {
                path: env.noobaa_core_dir.clone(),
                mode: WORLD_RWX.to_string(),
            },
        ),
        Step::new("create storage directory", Action::CreateDir(ctx.storage_dir())),
        Step::new(
            "open postgresql directory",
            Action::Chmod {
                path: env.postgresql_dir.clone(),
                mode: WORLD_RWX.to_string(),
            },
        ),
        Step::new("initialize database", Action::RunScript(Script::new("db:init"))),
        Step::new("start database", Action::SpawnScript(Script::new("db")))
            .settle(ctx.readiness("postgres", Some(env.postgres_port))),
        Step::new(
            "create database and users",
            Action::RunScript(Script::new("db:create")),
        )
        .settle(delay("postgres")),
        Step::new(
            "write env file",
            Action::WriteEnvFile {
                template: ctx.template_dir.join(&env.env_template),
                dest: env.env_file.clone(),
            },
        ),
        Step::new(
            "copy config-local.js",
            Action::CopyFile {
                source: ctx.template_dir.join(CONFIG_LOCAL_TEMPLATE),
                dest: env.config_local.clone(),
            },
        ),
        Step::new("start web service", Action::SpawnScript(Script::new("web")))
            .settle(ctx.readiness("web", Some(env.web_port))),
        Step::new("start bg service", Action::SpawnScript(Script::new("bg")))
            .settle(delay("bg")),
        Step::new(
            "start hosted agents",
            Action::SpawnScript(Script::new("hosted_agents")),
        )
        .settle(delay("hosted_agents")),
        Step::new("start s3 endpoint", Action::SpawnScript(Script::new("s3")))
            .settle(ctx.readiness("s3", Some(env.s3_port))),
    ];

    for (drive, port) in ctx.backing_stores.drives() {
        let label = drive.display().to_string();
        steps.push(Step::new(
            format!("create backing store drive {label}"),
            Action::CreateDir(drive.clone()),
        ));
        steps.push(
            Step::new(
                format!("start backing store {label} on port {port}"),
                Action::SpawnScript(Script::with_args(
                    "backingstore",
                    ["--".to_string(), label.clone(), "--port".to_string(), port.to_string()],
                )),
            )
            .settle(ctx.readiness(&format!("backingstore {label}"), Some(port))),
        );
    }

    steps.push(Step::new(
        "check storage status",
        Action::HealthCheck(HealthCheck::StorageStatus),
    ));
    steps.push(Step::new(
        "check aggregate node status",
        Action::HealthCheck(HealthCheck::AggregateNodeStatus),
    ));
    steps
}
