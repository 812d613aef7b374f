use super::{Action, Step};
use crate::context::ProvisioningContext;

pub(super) fn steps(ctx: &ProvisioningContext) -> Vec<Step> {
    let env = &ctx.env;
    vec![
        Step::new("install noobaa-core", Action::InstallMainPackage),
        Step::new(
            "create config directory",
            Action::MakeDir(env.noobaa_conf_dir.clone()),
        ),
        Step::new(
            "link nsfs env file",
            Action::Symlink {
                target: env.nsfs_env.clone(),
                link: env.noobaa_conf_dir.join(".env"),
            },
        ),
        Step::new(
            "start nsfs service",
            Action::StartService(env.nsfs_service.clone()),
        ),
        Step::new(
            "verify nsfs service",
            Action::VerifyService(env.nsfs_service.clone()),
        ),
        Step::new(
            "link node binary",
            Action::Symlink {
                target: ctx.node_path(),
                link: env.bin_dir.join(&env.node_cmd),
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::context::Variant;
    use crate::provision::Plan;
    use std::path::PathBuf;

    #[test]
    fn six_steps_in_order() {
        let mut loader = ConfigLoader::new().unwrap();
        loader
            .merge_str("ENV_DATA:\n  ip_address: 127.0.0.1\n", "test")
            .unwrap();
        let ctx = ProvisioningContext::build(&loader, Variant::Nsfs).unwrap();
        let plan = Plan::for_context(&ctx);
        assert_eq!(plan.steps.len(), 6);
        assert_eq!(plan.steps[0].action, Action::InstallMainPackage);
        assert_eq!(
            plan.steps[2].action,
            Action::Symlink {
                target: PathBuf::from("/usr/local/noobaa-core/nsfs_env"),
                link: PathBuf::from("/etc/noobaa.conf.d/.env"),
            }
        );
        assert_eq!(
            plan.steps[4].action,
            Action::VerifyService("noobaa".to_string())
        );
        assert_eq!(
            plan.steps[5].action,
            Action::Symlink {
                target: PathBuf::from("/usr/local/noobaa-core/node/bin/node"),
                link: PathBuf::from("/usr/local/bin/node"),
            }
        );
        assert!(plan.steps.iter().all(|step| step.settle.is_none()));
    }
}
