//! The function table templates are evaluated against.
//!
//! `gtmpl` only accepts plain function pointers, so the `ssm` entry reaches
//! its configuration through a thread-local slot that [`FunctionTable::render`]
//! fills for the duration of one render.

use std::{cell::RefCell, sync::Arc};

use anyhow::anyhow;
use gtmpl::{Context, Func, FuncError, Template, Value};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::{
    domain::ParameterPath,
    parameters::{error::ParameterError, options, resolver},
    storage::repository::ParameterStoreFactory,
};

use super::helpers::HELPERS;

pub const SSM_FUNCTION_NAME: &str = "ssm";

thread_local! {
    static ACTIVE_SSM: RefCell<Option<Arc<SsmFunction>>> = const { RefCell::new(None) };
    static FAILED_CALL: RefCell<Option<ParameterError>> = const { RefCell::new(None) };
}

/// Process-wide settings for the `ssm` function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionConfig {
    /// Prepended to every path unless the call sets its own `prefix`.
    pub prefix: String,
    /// When set, every `ssm` call renders as this tag and nothing is fetched.
    pub clean_tag: Option<String>,
}

enum SsmMode {
    Resolve {
        factory: Arc<dyn ParameterStoreFactory>,
        prefix: String,
    },
    Clean {
        tag: String,
    },
}

/// The callable behind `{{ ssm "path" "key=value" ... }}`.
pub struct SsmFunction {
    mode: SsmMode,
    runtime: Arc<Runtime>,
}

impl SsmFunction {
    /// Resolves one call site. Blocks until the store answers, so it must not
    /// be called from inside an async context.
    pub fn call<S: AsRef<str>>(&self, path: &str, tokens: &[S]) -> Result<String, ParameterError> {
        let (factory, global_prefix) = match &self.mode {
            SsmMode::Clean { tag } => return Ok(tag.clone()),
            SsmMode::Resolve { factory, prefix } => (factory, prefix),
        };

        let options = options::parse(tokens)?;
        let full_path = ParameterPath::parse(options.full_path(global_prefix, path))?;
        let scope = options.scope();

        debug!(
            parameter = %full_path,
            scope = %scope,
            required = options.required,
            "Resolving ssm call"
        );

        self.runtime.block_on(async {
            let store = factory.store_for(&scope).await.map_err(|source| {
                ParameterError::StoreUnavailable {
                    name: full_path.to_string(),
                    source,
                }
            })?;

            resolver::resolve(
                store.as_ref(),
                full_path.as_str(),
                options.required,
                options.default.as_deref(),
                true,
            )
            .await
        })
    }
}

/// Installs an [`SsmFunction`] for the current thread and restores the
/// previous one on drop.
struct ActiveFunction {
    previous: Option<Arc<SsmFunction>>,
}

impl ActiveFunction {
    fn install(function: Arc<SsmFunction>) -> Self {
        let previous = ACTIVE_SSM.with(|slot| slot.replace(Some(function)));
        Self { previous }
    }
}

impl Drop for ActiveFunction {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_SSM.with(|slot| {
            slot.replace(previous);
        });
    }
}

fn string_arg(value: &Value) -> Result<String, FuncError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(FuncError::Generic(format!(
            "{} expects string arguments, got {}",
            SSM_FUNCTION_NAME, other
        ))),
    }
}

fn ssm(args: &[Value]) -> Result<Value, FuncError> {
    let (path, tokens) = args.split_first().ok_or_else(|| {
        FuncError::Generic(format!("{} requires a parameter path", SSM_FUNCTION_NAME))
    })?;
    let path = string_arg(path)?;
    let tokens = tokens
        .iter()
        .map(string_arg)
        .collect::<Result<Vec<_>, _>>()?;

    let function = ACTIVE_SSM
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| {
            FuncError::Generic(format!("{} called outside of a render", SSM_FUNCTION_NAME))
        })?;

    function.call(&path, &tokens).map(Value::from).map_err(|e| {
        let message = e.to_string();
        FAILED_CALL.with(|slot| slot.replace(Some(e)));
        FuncError::Generic(message)
    })
}

/// `ssm` plus the helper functions, keyed by template name.
pub struct FunctionTable {
    ssm: Arc<SsmFunction>,
}

impl FunctionTable {
    /// Builds a table with its own single-threaded runtime for store calls.
    pub fn build(
        config: FunctionConfig,
        factory: Arc<dyn ParameterStoreFactory>,
    ) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::with_runtime(config, factory, Arc::new(runtime)))
    }

    pub fn with_runtime(
        config: FunctionConfig,
        factory: Arc<dyn ParameterStoreFactory>,
        runtime: Arc<Runtime>,
    ) -> Self {
        let mode = match config.clean_tag {
            Some(tag) => SsmMode::Clean { tag },
            None => SsmMode::Resolve {
                factory,
                prefix: config.prefix,
            },
        };

        Self {
            ssm: Arc::new(SsmFunction { mode, runtime }),
        }
    }

    pub fn ssm(&self) -> &SsmFunction {
        &self.ssm
    }

    pub fn is_clean(&self) -> bool {
        matches!(self.ssm.mode, SsmMode::Clean { .. })
    }

    pub fn functions(&self) -> Vec<(&'static str, Func)> {
        let mut functions = vec![(SSM_FUNCTION_NAME, ssm as Func)];
        functions.extend_from_slice(HELPERS);
        functions
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions().into_iter().map(|(name, _)| name).collect()
    }

    /// Evaluates `text` against this table. Fails on the first function
    /// error; no partial output is returned. A failed `ssm` call is reported
    /// as its [`ParameterError`].
    pub fn render(&self, text: &str) -> anyhow::Result<String> {
        let _active = ActiveFunction::install(Arc::clone(&self.ssm));
        FAILED_CALL.with(|slot| slot.replace(None));

        let mut template = Template::default();
        for (name, func) in self.functions() {
            template.add_func(name, func);
        }
        template
            .parse(text)
            .map_err(|e| anyhow!("failed to parse template: {}", e))?;

        template.render(&Context::empty()).map_err(|e| {
            match FAILED_CALL.with(|slot| slot.replace(None)) {
                Some(failed) => anyhow::Error::new(failed).context("failed to execute template"),
                None => anyhow!("failed to execute template: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreScope;
    use crate::storage::adapters::local_storage::{LocalStorage, LocalStorageFactory};
    use crate::storage::repository::StoreError;

    fn store() -> LocalStorage {
        LocalStorage::with_parameters([
            ("/root/existing", "value"),
            ("/global/key", "from-global"),
            ("/local/key", "from-local"),
        ])
    }

    fn table(config: FunctionConfig, store: LocalStorage) -> (FunctionTable, LocalStorageFactory) {
        let factory = LocalStorageFactory::new(store);
        let table = FunctionTable::build(config, Arc::new(factory.clone())).unwrap();
        (table, factory)
    }

    #[test]
    fn test_table_contains_ssm_and_helpers() {
        let (table, _) = table(FunctionConfig::default(), store());
        let names = table.names();

        assert!(names.contains(&"ssm"));
        assert!(names.contains(&"quote"));
        assert_eq!(names.len(), HELPERS.len() + 1);
    }

    #[test]
    fn test_render_existing_parameter() {
        let (table, _) = table(FunctionConfig::default(), store());
        let rendered = table.render(r#"password: {{ ssm "/root/existing" }}"#).unwrap();
        assert_eq!(rendered, "password: value");
    }

    #[test]
    fn test_render_missing_optional_with_prefix_option() {
        let storage = store();
        let (table, _) = table(FunctionConfig::default(), storage.clone());

        let rendered = table
            .render(r#"value: "{{ ssm "missing" "required=false" "prefix=/root/" }}""#)
            .unwrap();

        assert_eq!(rendered, r#"value: """#);
        assert_eq!(storage.requests(), vec!["/root/missing".to_string()]);
    }

    #[test]
    fn test_render_missing_required_fails() {
        let (table, _) = table(FunctionConfig::default(), store());
        let err = table.render(r#"{{ ssm "/root/missing" }}"#).unwrap_err();

        assert!(format!("{:#}", err).contains("Parameter '/root/missing' not found"));
        assert_eq!(
            err.downcast_ref::<ParameterError>(),
            Some(&ParameterError::ParameterNotFound {
                name: "/root/missing".to_string()
            })
        );
    }

    #[test]
    fn test_render_default_option() {
        let (table, _) = table(FunctionConfig::default(), store());
        let rendered = table
            .render(r#"{{ ssm "/root/missing" "default=fallback" }}"#)
            .unwrap();
        assert_eq!(rendered, "fallback");
    }

    #[test]
    fn test_global_prefix_applies_without_call_prefix() {
        let config = FunctionConfig {
            prefix: "/global/".to_string(),
            ..Default::default()
        };
        let (table, _) = table(config, store());

        assert_eq!(table.render(r#"{{ ssm "key" }}"#).unwrap(), "from-global");
        assert_eq!(
            table.render(r#"{{ ssm "key" "prefix=/local/" }}"#).unwrap(),
            "from-local"
        );
    }

    #[test]
    fn test_invalid_option_never_reaches_store() {
        let storage = store();
        let (table, factory) = table(FunctionConfig::default(), storage.clone());

        let err = table
            .render(r#"{{ ssm "/root/existing" "decrypt=false" }}"#)
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Invalid option: decrypt=false"));
        assert_eq!(storage.fetch_count(), 0);
        assert_eq!(factory.created_count(), 0);
    }

    #[test]
    fn test_invalid_name_never_reaches_store() {
        let storage = store();
        let (table, factory) = table(FunctionConfig::default(), storage.clone());

        let err = table.render(r#"{{ ssm "/root/bad name" }}"#).unwrap_err();

        assert!(format!("{:#}", err).contains("invalid character"));
        assert_eq!(storage.fetch_count(), 0);
        assert_eq!(factory.created_count(), 0);
    }

    #[test]
    fn test_store_failure_fails_render() {
        let storage = store();
        storage.fail_with("/root/existing", StoreError::Throttled("Rate exceeded".to_string()));
        let (table, _) = table(FunctionConfig::default(), storage);

        let err = table
            .render(r#"{{ ssm "/root/existing" "required=false" "default=x" }}"#)
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Request throttled: Rate exceeded"));
    }

    #[test]
    fn test_region_option_selects_scoped_store() {
        let regional = LocalStorage::with_parameters([("/root/existing", "regional")]);
        let factory = LocalStorageFactory::new(store()).with_scope(
            StoreScope::new(Some("us-east-1".to_string()), None),
            regional.clone(),
        );
        let table = FunctionTable::build(FunctionConfig::default(), Arc::new(factory)).unwrap();

        let rendered = table
            .render(r#"{{ ssm "/root/existing" }} {{ ssm "/root/existing" "region=us-east-1" }}"#)
            .unwrap();

        assert_eq!(rendered, "value regional");
        assert_eq!(regional.fetch_count(), 1);
    }

    #[test]
    fn test_repeated_calls_fetch_every_time() {
        let storage = store();
        let (table, _) = table(FunctionConfig::default(), storage.clone());

        let rendered = table
            .render(r#"{{ ssm "/root/existing" }}/{{ ssm "/root/existing" }}"#)
            .unwrap();

        assert_eq!(rendered, "value/value");
        assert_eq!(storage.fetch_count(), 2);
    }

    #[test]
    fn test_clean_mode_never_contacts_store() {
        let storage = store();
        let config = FunctionConfig {
            prefix: "/global/".to_string(),
            clean_tag: Some("CLEANED".to_string()),
        };
        let (table, factory) = table(config, storage.clone());

        let template = r#"a: {{ ssm "/root/existing" }} b: {{ ssm "/root/missing" "region=x" }}"#;
        let rendered = table.render(template).unwrap();

        assert!(table.is_clean());
        assert_eq!(rendered, "a: CLEANED b: CLEANED");
        assert_eq!(factory.created_count(), 0);
        assert_eq!(storage.fetch_count(), 0);
    }

    #[test]
    fn test_ssm_pipes_into_helpers() {
        let (table, _) = table(FunctionConfig::default(), store());
        let quoted = table.render(r#"{{ ssm "/root/existing" | upper | quote }}"#).unwrap();
        let encoded = table.render(r#"{{ ssm "/root/existing" | b64enc }}"#).unwrap();
        assert_eq!(quoted, r#""VALUE""#);
        assert_eq!(encoded, "dmFsdWU=");
    }

    #[test]
    fn test_builtin_functions_still_work() {
        let (table, _) = table(FunctionConfig::default(), store());
        assert_eq!(table.render("example: {{ and true false }}").unwrap(), "example: false");
    }

    #[test]
    fn test_direct_call() {
        let (table, _) = table(FunctionConfig::default(), store());
        let value = table
            .ssm()
            .call("existing", &["prefix=/root/"])
            .unwrap();
        assert_eq!(value, "value");
    }

    #[test]
    fn test_ssm_outside_render_fails() {
        assert!(ssm(&[Value::from("/root/existing".to_string())]).is_err());
    }
}
