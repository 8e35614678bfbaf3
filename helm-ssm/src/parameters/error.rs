use std::fmt;

use crate::storage::repository::StoreError;

/// Outcome of a failed `ssm` call, as reported to the template author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    InvalidOption {
        token: String,
        allowed: &'static [&'static str],
    },
    InvalidParameterName {
        path: String,
        pattern: &'static str,
    },
    ParameterNotFound {
        name: String,
    },
    StoreUnavailable {
        name: String,
        source: StoreError,
    },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOption { token, allowed } => write!(
                f,
                "Invalid option: {}. Valid options: [{}]",
                token,
                allowed.join(", ")
            ),
            Self::InvalidParameterName { path, pattern } => write!(
                f,
                "There is an invalid character in the name of the parameter: {}. \
                 It should match {}",
                path, pattern
            ),
            Self::ParameterNotFound { name } => write!(f, "Parameter '{}' not found", name),
            Self::StoreUnavailable { name, source } => {
                write!(f, "Failed to get parameter '{}': {}", name, source)
            }
        }
    }
}

impl std::error::Error for ParameterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StoreUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}
