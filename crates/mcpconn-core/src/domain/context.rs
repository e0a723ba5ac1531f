//! Caller context for connection construction.
//!
//! A repository is usually scoped to one owner (a user session). The context
//! it was created with is handed to the connection factory on every
//! construction and is otherwise opaque to the repository.

use std::collections::HashMap;

/// Placeholder name that always resolves to [`ConnectionContext::owner_id`].
pub const OWNER_ID_VAR: &str = "OWNER_ID";

/// Per-caller context forwarded unmodified to the connection factory.
///
/// # Example
/// ```
/// use mcpconn_core::ConnectionContext;
///
/// let ctx = ConnectionContext::new("user-42").with_var("GITHUB_TOKEN", "ghp_xxx");
/// assert_eq!(ctx.lookup("OWNER_ID"), Some("user-42"));
/// assert_eq!(ctx.lookup("GITHUB_TOKEN"), Some("ghp_xxx"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Identity of the owner this repository serves
    pub owner_id: String,

    /// Owner-specific values substituted into `{{NAME}}` placeholders
    pub user_vars: HashMap<String, String>,
}

impl ConnectionContext {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            user_vars: HashMap::new(),
        }
    }

    /// Add a user variable (builder pattern).
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_vars.insert(name.into(), value.into());
        self
    }

    /// Look up a placeholder value. `OWNER_ID` maps to the owner identity,
    /// anything else to the user variables.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if name == OWNER_ID_VAR {
            return Some(&self.owner_id);
        }
        self.user_vars.get(name).map(String::as_str)
    }
}
