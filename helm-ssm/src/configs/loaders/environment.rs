use std::env;

/// Value of `env_name`, treating an unset or empty variable as absent.
pub fn optional_env(env_name: &str) -> Option<String> {
    env::var(env_name).ok().filter(|value| !value.is_empty())
}

pub fn env_is_set(env_name: &str) -> bool {
    env::var_os(env_name).is_some()
}
