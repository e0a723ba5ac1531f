//! Placeholder substitution for server configurations
//!
//! Two forms are recognized:
//! - `{{NAME}}` - looked up in the caller's [`ConnectionContext`]
//! - `${env:NAME}` - looked up in the process environment
//!
//! Anything that cannot be resolved is left verbatim so a misconfigured value
//! shows up in the server's own error rather than silently becoming empty.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::domain::ConnectionContext;

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}|\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("placeholder regex is valid");
}

/// Resolve placeholders in `template`.
pub fn resolve_placeholders(template: &str, context: Option<&ConnectionContext>) -> String {
    resolve_with(template, context, |name| std::env::var(name).ok())
}

fn resolve_with(
    template: &str,
    context: Option<&ConnectionContext>,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    if !template.contains("{{") && !template.contains("${env:") {
        return template.to_string();
    }

    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            if let Some(name) = caps.get(1) {
                if let Some(value) = context.and_then(|ctx| ctx.lookup(name.as_str())) {
                    return value.to_string();
                }
            } else if let Some(name) = caps.get(2) {
                if let Some(value) = env(name.as_str()) {
                    return value;
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}
