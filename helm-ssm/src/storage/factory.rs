use std::sync::Arc;

use aws_config::{BehaviorVersion, ConfigLoader, sts::AssumeRoleProvider};
use aws_types::{SdkConfig, region::Region};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    configs::{ExecutionContext, SessionConfig},
    domain::StoreScope,
    storage::{
        adapters::ssm_storage::SsmStorage,
        repository::{ParameterStore, ParameterStoreFactory, StoreError},
    },
};

const ASSUMED_ROLE_SESSION_NAME: &str = "helm-ssm";

/// Builds [`SsmStorage`] clients from the session configuration.
///
/// The client for the default scope is created on first use and shared for
/// the rest of the run. Region or account overrides get a fresh client per
/// call.
pub struct SsmStorageFactory {
    config: SessionConfig,
    default_store: OnceCell<Arc<dyn ParameterStore>>,
}

impl SsmStorageFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            default_store: OnceCell::new(),
        }
    }

    async fn build(&self, scope: &StoreScope) -> Result<Arc<dyn ParameterStore>, StoreError> {
        let sdk_config = match &self.config.execution {
            ExecutionContext::Interactive => self.interactive_config(scope).await,
            ExecutionContext::Lambda {
                cross_account_role_arn,
                ..
            } => {
                self.lambda_config(scope, cross_account_role_arn.as_deref())
                    .await?
            }
        };

        let store: Arc<dyn ParameterStore> = Arc::new(SsmStorage::new(&sdk_config));
        Ok(store)
    }

    fn loader(&self, scope: &StoreScope) -> ConfigLoader {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = scope.region.clone().or_else(|| self.config.region.clone()) {
            loader = loader.region(Region::new(region));
        }

        if let Some(endpoint_url) = &self.config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }

        loader
    }

    async fn interactive_config(&self, scope: &StoreScope) -> SdkConfig {
        let mut loader = self.loader(scope);

        if let Some(profile) = self.config.profile_for(scope.account.as_deref()) {
            debug!(profile = %profile, "Using AWS profile");
            loader = loader.profile_name(profile);
        }

        loader.load().await
    }

    async fn lambda_config(
        &self,
        scope: &StoreScope,
        cross_account_role_arn: Option<&str>,
    ) -> Result<SdkConfig, StoreError> {
        let base_config = self.loader(scope).load().await;

        if !self.config.needs_role_assumption(scope.account.as_deref()) {
            return Ok(base_config);
        }

        let role_arn = cross_account_role_arn.ok_or_else(|| {
            StoreError::AccessDenied(format!(
                "Account '{}' requires a cross-account role but CROSS_ACCOUNT_ARN is not set",
                scope.account.as_deref().unwrap_or_default()
            ))
        })?;

        info!(role_arn, "Assuming cross-account role for parameter lookups");

        let provider = AssumeRoleProvider::builder(role_arn)
            .session_name(ASSUMED_ROLE_SESSION_NAME)
            .configure(&base_config)
            .build()
            .await;

        Ok(self
            .loader(scope)
            .credentials_provider(provider)
            .load()
            .await)
    }
}

#[async_trait::async_trait]
impl ParameterStoreFactory for SsmStorageFactory {
    async fn store_for(&self, scope: &StoreScope) -> Result<Arc<dyn ParameterStore>, StoreError> {
        if scope.is_default() {
            let store = self
                .default_store
                .get_or_try_init(|| self.build(scope))
                .await?;
            return Ok(Arc::clone(store));
        }

        debug!(scope = %scope, "Creating scoped parameter store client");
        self.build(scope).await
    }
}
