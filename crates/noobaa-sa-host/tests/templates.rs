use noobaa_sa_host::templating::render_template_file;
use noobaa_sa_host::{ConfigLoader, ProvisioningContext, Result, Variant};

fn context() -> Result<ProvisioningContext> {
    let mut loader = ConfigLoader::new()?;
    loader.merge_str("ENV_DATA:\n  ip_address: 10.0.0.9\n", "test")?;
    ProvisioningContext::build(&loader, Variant::Db)
}

#[test]
fn bundled_env_template_renders_with_defaults() -> Result<()> {
    let ctx = context()?;
    let rendered = render_template_file(
        &ctx.template_dir.join(&ctx.env.env_template),
        &ctx.template_values,
    )?;
    assert!(rendered.contains("POSTGRES_DBNAME=nbcore\n"));
    assert!(rendered.contains("POSTGRES_PORT=5432\n"));
    assert!(rendered.contains("MGMT_ADDR=wss://10.0.0.9:8080\n"));
    assert!(rendered.contains("NOOBAA_STORAGE_DIR=/usr/local/noobaa-core/noobaa_storage\n"));
    Ok(())
}

#[test]
fn bundled_config_local_is_present() -> Result<()> {
    let ctx = context()?;
    assert!(ctx.template_dir.join("config-local.js").is_file());
    Ok(())
}
