use crate::domain::CallOptions;

use super::error::ParameterError;

pub const ALLOWED_OPTIONS: &[&str] = &["required", "prefix", "region", "default", "account"];

/// Parses `key=value` tokens into [`CallOptions`].
///
/// Every token must contain exactly one `=` and use a key from
/// [`ALLOWED_OPTIONS`]. `region` and `account` need a non-empty value. When a
/// key repeats, the last occurrence wins.
pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<CallOptions, ParameterError> {
    let mut options = CallOptions::default();

    for token in tokens {
        let token = token.as_ref();
        let (key, value) = split_token(token).ok_or_else(|| invalid_option(token))?;

        match key {
            "required" => {
                options.required = value.parse().map_err(|_| invalid_option(token))?;
            }
            "region" | "account" if value.is_empty() => return Err(invalid_option(token)),
            "prefix" => options.prefix = Some(value.to_string()),
            "region" => options.region = Some(value.to_string()),
            "default" => options.default = Some(value.to_string()),
            "account" => options.account = Some(value.to_string()),
            _ => return Err(invalid_option(token)),
        }
    }

    Ok(options)
}

fn split_token(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    if value.contains('=') {
        return None;
    }
    Some((key, value))
}

fn invalid_option(token: &str) -> ParameterError {
    ParameterError::InvalidOption {
        token: token.to_string(),
        allowed: ALLOWED_OPTIONS,
    }
}
