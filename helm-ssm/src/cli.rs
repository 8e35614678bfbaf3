use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::runtime::Builder;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{
    configs::{Configs, SessionConfig},
    storage::factory::SsmStorageFactory,
    template::{FunctionConfig, FunctionTable, RenderOptions, render_files},
};

#[derive(Parser, Debug)]
#[command(
    name = "helm-ssm",
    version,
    about = "Render templates with values from AWS SSM Parameter Store",
    long_about = None
)]
pub struct Args {
    /// Template files to render (comma separated, can be repeated)
    #[arg(long, short = 'f', required = true, value_delimiter = ',')]
    pub values: Vec<PathBuf>,

    /// Print the rendered content of each file
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Render without writing any file
    #[arg(long, short = 'd')]
    pub dry_run: bool,

    /// Directory to write rendered files to, instead of replacing the templates
    #[arg(long, short = 'o')]
    pub target_dir: Option<PathBuf>,

    /// AWS profile used to fetch the parameters
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// AWS region used unless a call sets `region=...`
    #[arg(long, short = 'r')]
    pub region: Option<String>,

    /// Replace every ssm call with the cleaned tag, without fetching anything
    #[arg(long, short = 'c')]
    pub clean: bool,

    /// Text that replaces cleaned ssm calls
    #[arg(long, short = 't', default_value = "")]
    pub tag_cleaned: String,

    /// Prefix for all parameter paths. Ignored by calls that set `prefix=...`
    #[arg(long, short = 'P', default_value = "")]
    pub prefix: String,

    /// Custom SSM endpoint (e.g. http://localhost:4566)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Map an `account=...` value to an AWS profile, as ACCOUNT=PROFILE (can be repeated)
    #[arg(long, value_parser = parse_account_profile)]
    pub account_profile: Vec<(String, String)>,
}

impl Args {
    pub fn function_config(&self) -> FunctionConfig {
        FunctionConfig {
            prefix: self.prefix.clone(),
            clean_tag: self.clean.then(|| self.tag_cleaned.clone()),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            verbose: self.verbose,
            dry_run: self.dry_run,
            target_dir: self.target_dir.clone(),
        }
    }

    pub fn session_overrides(&self, config: SessionConfig) -> SessionConfig {
        config
            .with_profile(self.profile.clone())
            .with_region(self.region.clone())
            .with_endpoint_url(self.endpoint_url.clone())
            .with_account_profiles(self.account_profile.clone())
    }
}

fn parse_account_profile(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((account, profile)) if !account.is_empty() && !profile.is_empty() => {
            Ok((account.to_string(), profile.to_string()))
        }
        _ => Err(format!("expected ACCOUNT=PROFILE, got '{}'", value)),
    }
}

/// Logs go to stderr; stdout carries the verbose output.
pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()) // reads RUST_LOG
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let runtime = Arc::new(
        Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?,
    );

    let session = runtime
        .block_on(SessionConfig::load())
        .map_err(|e| anyhow!("failed to load session configuration: {}", e))?;
    let session = args.session_overrides(session);
    debug!(?session, "Session configuration");

    let function_config = args.function_config();
    if function_config.clean_tag.is_some() {
        info!("Clean mode enabled, parameters will not be fetched");
    }

    let factory = Arc::new(SsmStorageFactory::new(session));
    let table = FunctionTable::with_runtime(function_config, factory, runtime);

    render_files(&args.values, &table, &args.render_options())
}
