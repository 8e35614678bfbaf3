use std::collections::HashMap;

use super::{
    Configs,
    loaders::environment::{env_is_set, optional_env},
};

const LAMBDA_FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";
const PIPELINE_ENVIRONMENT_ENV: &str = "PIPELINE_ENVIRONMENT";
const CROSS_ACCOUNT_ARN_ENV: &str = "CROSS_ACCOUNT_ARN";
const PROFILE_ENV: &str = "AWS_PROFILE";
const REGION_ENV: &str = "AWS_REGION";
const ENDPOINT_URL_ENV: &str = "AWS_ENDPOINT_URL_SSM";

const DEFAULT_ACCOUNT_PROFILES: &[(&str, &str)] =
    &[("staging", "staging"), ("production", "default")];

/// How AWS credentials are obtained for this run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// Shared config/credentials files and named profiles.
    #[default]
    Interactive,
    /// Running inside AWS Lambda. Lookups for an account other than the
    /// pipeline's own assume `cross_account_role_arn`.
    Lambda {
        pipeline_environment: Option<String>,
        cross_account_role_arn: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub account_profiles: HashMap<String, String>,
    pub execution: ExecutionContext,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            endpoint_url: None,
            account_profiles: DEFAULT_ACCOUNT_PROFILES
                .iter()
                .map(|(account, profile)| (account.to_string(), profile.to_string()))
                .collect(),
            execution: ExecutionContext::Interactive,
        }
    }
}

impl SessionConfig {
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: Option<String>) -> Self {
        if endpoint_url.is_some() {
            self.endpoint_url = endpoint_url;
        }
        self
    }

    pub fn with_account_profiles(
        mut self,
        account_profiles: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.account_profiles.extend(account_profiles);
        self
    }

    /// Profile used for `account`. Accounts without a mapping are used as
    /// profile names directly; no account means the global profile.
    pub fn profile_for(&self, account: Option<&str>) -> Option<String> {
        match account {
            Some(account) => Some(
                self.account_profiles
                    .get(account)
                    .cloned()
                    .unwrap_or_else(|| account.to_string()),
            ),
            None => self.profile.clone(),
        }
    }

    /// Only an explicitly requested account that differs from the pipeline's
    /// own environment triggers a role assumption.
    pub fn needs_role_assumption(&self, account: Option<&str>) -> bool {
        match (&self.execution, account) {
            (
                ExecutionContext::Lambda {
                    pipeline_environment,
                    ..
                },
                Some(account),
            ) => pipeline_environment.as_deref() != Some(account),
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl Configs for SessionConfig {
    async fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let execution = if env_is_set(LAMBDA_FUNCTION_NAME_ENV) {
            ExecutionContext::Lambda {
                pipeline_environment: optional_env(PIPELINE_ENVIRONMENT_ENV),
                cross_account_role_arn: optional_env(CROSS_ACCOUNT_ARN_ENV),
            }
        } else {
            ExecutionContext::Interactive
        };

        Ok(SessionConfig {
            profile: optional_env(PROFILE_ENV),
            region: optional_env(REGION_ENV),
            endpoint_url: optional_env(ENDPOINT_URL_ENV),
            execution,
            ..Default::default()
        })
    }
}
