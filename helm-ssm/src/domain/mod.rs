use std::fmt;

use crate::parameters::error::ParameterError;

/// Character class every parameter name must consist of.
pub const PARAMETER_NAME_PATTERN: &str = "[A-Za-z0-9./_-]*";

/// A parameter name that has been checked against [`PARAMETER_NAME_PATTERN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParameterPath(String);

impl ParameterPath {
    /// Validates the whole of `path`. A name that is only partially made of
    /// allowed characters is rejected.
    pub fn parse(path: impl Into<String>) -> Result<Self, ParameterError> {
        let path = path.into();
        if path.chars().all(is_allowed) {
            Ok(Self(path))
        } else {
            Err(ParameterError::InvalidParameterName {
                path,
                pattern: PARAMETER_NAME_PATTERN,
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/')
}

/// Region and account a store client is scoped to. The empty scope selects
/// the process-wide default session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StoreScope {
    pub region: Option<String>,
    pub account: Option<String>,
}

impl StoreScope {
    pub fn new(region: Option<String>, account: Option<String>) -> Self {
        Self { region, account }
    }

    pub fn is_default(&self) -> bool {
        self.region.is_none() && self.account.is_none()
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region={} account={}",
            self.region.as_deref().unwrap_or("<default>"),
            self.account.as_deref().unwrap_or("<default>")
        )
    }
}

/// Options attached to a single `ssm` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    pub required: bool,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub default: Option<String>,
    pub account: Option<String>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            required: true,
            prefix: None,
            region: None,
            default: None,
            account: None,
        }
    }
}

impl CallOptions {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }

    /// A prefix given on the call replaces the process-wide one.
    pub fn effective_prefix<'a>(&'a self, global_prefix: &'a str) -> &'a str {
        self.prefix.as_deref().unwrap_or(global_prefix)
    }

    pub fn full_path(&self, global_prefix: &str, path: &str) -> String {
        format!("{}{}", self.effective_prefix(global_prefix), path)
    }

    pub fn scope(&self) -> StoreScope {
        StoreScope::new(self.region.clone(), self.account.clone())
    }
}
