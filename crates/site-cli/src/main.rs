// # site - Static Website Action Dispatcher
//
// A THIN integration layer: it reads configuration from the environment,
// initializes logging and the runtime, picks a backend and a state store from
// the registry and routes one execution request into site-core. All
// reconciliation logic lives in site-core.
//
// ## Configuration
//
// ### Backend
// - `SITE_PROVIDER_TYPE`: Resource backend (default: memory)
//
// ### State Store
// - `SITE_STATE_STORE_TYPE`: Type of state store (file, memory). Defaults to
//   memory with the memory backend, so simulated ids never reach a state file,
//   and to file otherwise
// - `SITE_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `SITE_WORKSPACE_ROOT`: Root that content paths are resolved against
// - `SITE_DISABLE_TIMEOUT_SECS`: Upper bound on the distribution disable wait
//   during removal (`0` waits indefinitely)
// - `SITE_LOG_LEVEL`: trace, debug, info, warn, error
//
// ### Credentials
// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`
//
// ## Example
//
// ```bash
// site '{"action":["run"],"instanceName":"marketing","config":{"domain":"example.com"}}'
//
// export SITE_STATE_STORE_TYPE=file
// export SITE_STATE_STORE_PATH=/var/lib/site/marketing.json
// site '{"action":"info","instanceName":"marketing"}'
// ```
//
// The execution report is printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use site_core::traits::EnvCredentialProvider;
use site_core::{BackendRegistry, EngineConfig, ExecutionReport, ExecutionRequest, SiteEngine, StateStoreConfig};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the dispatcher
///
/// - 0: The action succeeded
/// - 1: Configuration or startup error (nothing was attempted)
/// - 2: The action ran and failed
#[derive(Debug, Clone, Copy)]
enum SiteExitCode {
    Success = 0,
    ConfigError = 1,
    ActionFailed = 2,
}

impl From<SiteExitCode> for ExitCode {
    fn from(code: SiteExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Dispatcher configuration
struct Config {
    provider_type: String,
    state_store_type: String,
    state_store_path: Option<String>,
    workspace_root: Option<String>,
    disable_timeout_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let disable_timeout_secs = env::var("SITE_DISABLE_TIMEOUT_SECS")
            .ok()
            .map(|s| {
                s.parse::<u64>()
                    .with_context(|| format!("SITE_DISABLE_TIMEOUT_SECS is not a number: {}", s))
            })
            .transpose()?;

        let provider_type =
            env::var("SITE_PROVIDER_TYPE").unwrap_or_else(|_| "memory".to_string());
        let state_store_type = env::var("SITE_STATE_STORE_TYPE")
            .unwrap_or_else(|_| default_state_store_type(&provider_type).to_string());

        Ok(Self {
            provider_type,
            state_store_type,
            state_store_path: env::var("SITE_STATE_STORE_PATH").ok(),
            workspace_root: env::var("SITE_WORKSPACE_ROOT").ok(),
            disable_timeout_secs,
            log_level: env::var("SITE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration against the registry
    fn validate(&self, registry: &BackendRegistry) -> Result<()> {
        if !registry.has_backend(&self.provider_type) {
            anyhow::bail!(
                "SITE_PROVIDER_TYPE '{}' is not supported. Supported backends: {}",
                self.provider_type,
                registry.list_backends().join(", ")
            );
        }

        if !registry.has_state_store(&self.state_store_type) {
            anyhow::bail!(
                "SITE_STATE_STORE_TYPE '{}' is not supported. Supported types: {}",
                self.state_store_type,
                registry.list_state_stores().join(", ")
            );
        }

        if self.state_store_type == "file" {
            match self.state_store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "SITE_STATE_STORE_PATH is required when SITE_STATE_STORE_TYPE=file. \
                    Set it via: export SITE_STATE_STORE_PATH=/var/lib/site/state.json"
                ),
                Some(_) => {}
            }
        }

        if let Some(root) = self.workspace_root.as_deref()
            && root.is_empty()
        {
            anyhow::bail!("SITE_WORKSPACE_ROOT cannot be empty when set");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SITE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn state_store_config(&self) -> StateStoreConfig {
        match self.state_store_type.as_str() {
            "file" => StateStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
            _ => StateStoreConfig::Memory,
        }
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(root) = &self.workspace_root {
            config = config.with_workspace_root(root);
        }
        if let Some(secs) = self.disable_timeout_secs {
            config.distribution_disable_timeout_secs = (secs > 0).then_some(secs);
        }
        config
    }
}

/// State store used when `SITE_STATE_STORE_TYPE` is unset
fn default_state_store_type(provider_type: &str) -> &'static str {
    if provider_type == "memory" { "memory" } else { "file" }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SiteExitCode::ConfigError.into();
        }
    };

    let registry = BackendRegistry::with_builtin();
    if let Err(e) = config.validate(&registry) {
        eprintln!("Configuration validation error: {}", e);
        return SiteExitCode::ConfigError.into();
    }

    let payload = match env::args().nth(1) {
        Some(payload) => payload,
        None => {
            eprintln!("Usage: site '<execution request JSON>'");
            return SiteExitCode::ConfigError.into();
        }
    };

    let request = match ExecutionRequest::from_json(&payload) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            return SiteExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SiteExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SiteExitCode::ConfigError.into();
        }
    };

    let report = match rt.block_on(dispatch(&config, &registry, &request)) {
        Ok(report) => report,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return SiteExitCode::ConfigError.into();
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize the report: {}", e);
            return SiteExitCode::ActionFailed.into();
        }
    }

    if report.is_success() {
        SiteExitCode::Success.into()
    } else {
        SiteExitCode::ActionFailed.into()
    }
}

/// Build the engine and route the request
async fn dispatch(
    config: &Config,
    registry: &BackendRegistry,
    request: &ExecutionRequest,
) -> Result<ExecutionReport> {
    info!(
        "Running {:?} for {} (backend: {}, state store: {})",
        request.action, request.instance_name, config.provider_type, config.state_store_type
    );

    let state_store = registry
        .create_state_store(&config.state_store_config())
        .await
        .context("Failed to open the state store")?;
    let backend = registry
        .backend(&config.provider_type)
        .context("Failed to look up the backend")?;

    let (engine, mut events) = SiteEngine::new(
        state_store,
        Box::new(EnvCredentialProvider),
        backend,
        config.engine_config(),
    )
    .context("Failed to create the engine")?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    Ok(engine.execute(request).await)
}
