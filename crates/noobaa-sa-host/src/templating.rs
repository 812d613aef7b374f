use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{DeployError, Result};

static HANDLEBARS: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry
});

/// Render a template file against `values`. Strict mode turns a reference to
/// a missing key into an error instead of an empty string.
pub fn render_template_file(path: &Path, values: &Value) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|err| DeployError::io(path, err))?;
    render_template_str(&raw, values).map_err(|reason| DeployError::Template {
        path: path.to_path_buf(),
        reason,
    })
}

fn render_template_str(raw: &str, values: &Value) -> std::result::Result<String, String> {
    HANDLEBARS
        .render_template(raw, values)
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_values_without_escaping() {
        let rendered = render_template_str(
            "POSTGRES_HOST={{postgres_host}}\nURL=https://{{ip_address}}:{{s3_ssl_port}}/&x\n",
            &json!({"postgres_host": "127.0.0.1", "ip_address": "10.0.0.4", "s3_ssl_port": 6443}),
        )
        .unwrap();
        assert_eq!(
            rendered,
            "POSTGRES_HOST=127.0.0.1\nURL=https://10.0.0.4:6443/&x\n"
        );
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(render_template_str("{{nope}}", &json!({})).is_err());
    }

    #[test]
    fn file_errors_carry_the_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("env.hbs");
        fs::write(&path, "A={{missing}}\n").unwrap();
        let err = render_template_file(&path, &json!({})).unwrap_err();
        assert!(matches!(err, DeployError::Template { .. }));
        assert!(err.to_string().contains("env.hbs"));

        let absent = temp.path().join("absent.hbs");
        assert!(matches!(
            render_template_file(&absent, &json!({})),
            Err(DeployError::Io { .. })
        ));
    }
}
