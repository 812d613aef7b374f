use std::fmt;

use regex::Regex;
use url::Url;

use crate::error::{ArtifactError, Result};
use crate::listing::ListingEntry;

/// Compiled RPM file-name pattern.
///
/// The template is a format string with `{rhel_version}` and `{arch}`
/// placeholders (`{{`/`}}` for literal braces). Substitution is plain text,
/// so operators may put regex syntax in either value on purpose. Matching is
/// anchored at the start of the candidate only; anything after the pattern is
/// ignored.
#[derive(Clone, Debug)]
pub struct ArtifactPattern {
    platform_tag: String,
    rendered: String,
    matcher: Regex,
}

impl ArtifactPattern {
    pub fn compile(template: &str, platform_tag: &str, arch_tag: &str) -> Result<Self> {
        let rendered = render_template(template, platform_tag, arch_tag)?;
        let matcher =
            Regex::new(&format!("^(?:{rendered})")).map_err(|err| ArtifactError::InvalidPattern {
                pattern: rendered.clone(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            platform_tag: platform_tag.to_string(),
            rendered,
            matcher,
        })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn platform_tag(&self) -> &str {
        &self.platform_tag
    }
}

impl fmt::Display for ArtifactPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

fn render_template(template: &str, platform_tag: &str, arch_tag: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(ArtifactError::InvalidPattern {
                        pattern: template.to_string(),
                        reason: "unterminated placeholder".to_string(),
                    });
                }
                match name.trim() {
                    "rhel_version" => out.push_str(platform_tag),
                    "arch" => out.push_str(arch_tag),
                    other => {
                        return Err(ArtifactError::InvalidPattern {
                            pattern: template.to_string(),
                            reason: format!("unknown placeholder `{{{other}}}`"),
                        });
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Return the absolute URL of the first entry, in listing order, whose href
/// matches `pattern`.
pub fn locate_file(
    entries: &[ListingEntry],
    pattern: &ArtifactPattern,
    base_url: &Url,
) -> Result<Url> {
    let Some(entry) = entries.iter().find(|entry| pattern.matches(&entry.href)) else {
        return Err(ArtifactError::NotFound(format!(
            "no RPM matching `{pattern}` found in {base_url}"
        )));
    };
    base_url.join(&entry.href).map_err(|source| ArtifactError::InvalidUrl {
        url: entry.href.clone(),
        source,
    })
}
