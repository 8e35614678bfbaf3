use tracing::{debug, warn};

use crate::domain::ParameterPath;
use crate::storage::repository::ParameterStore;

use super::error::ParameterError;

/// Looks up `full_path` in `store` and applies the not-found policy.
///
/// The name is validated before the store is contacted. A missing parameter
/// resolves to `default` when one is given, to an empty string when it is
/// not `required`, and to [`ParameterError::ParameterNotFound`] otherwise.
/// Any other store failure is returned as
/// [`ParameterError::StoreUnavailable`].
pub async fn resolve(
    store: &dyn ParameterStore,
    full_path: &str,
    required: bool,
    default: Option<&str>,
    decrypt: bool,
) -> Result<String, ParameterError> {
    let path = ParameterPath::parse(full_path)?;

    debug!(parameter = %path, decrypt, "Fetching parameter");

    match store.fetch(path.as_str(), decrypt).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => match default {
            Some(default) => {
                debug!(parameter = %path, "Parameter not found, using default value");
                Ok(default.to_string())
            }
            None if !required => {
                debug!(parameter = %path, "Optional parameter not found, using empty value");
                Ok(String::new())
            }
            None => Err(ParameterError::ParameterNotFound {
                name: path.into_inner(),
            }),
        },
        Err(source) => {
            warn!(parameter = %path, error = %source, "Parameter store request failed");
            Err(ParameterError::StoreUnavailable {
                name: path.into_inner(),
                source,
            })
        }
    }
}
