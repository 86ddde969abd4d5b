use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tofui_api::{ApiClient, CachedContentService};
use tofui_core::ContentService;
use tofui_server::config::{default_config_path, Cli, CliCommand, Config};
use tofui_server::host::{HostContext, HostSettings};
use tofui_server::registry::SessionRegistry;
use tofui_server::signin::{self, SigninState};
use tofui_server::{local, logging, ssh};
use tofui_storage::SqliteStore;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if cli.command == CliCommand::Init {
        Config::write_default(&config_path)?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load(&config_path)?;
    config.apply_env(|key| std::env::var(key).ok());
    let serving = cli.command == CliCommand::Serve;
    let _log_guard = logging::init_logging(&config, cli.debug, serving);
    info!(
        event = "tofui_start",
        config = %config_path.display(),
        command = ?cli.command
    );

    let ctx = build_context(&config)?;
    let result = match cli.command {
        CliCommand::Serve => serve(&config, ctx).await,
        CliCommand::Local { compose } => run_local(&config, ctx, compose).await,
        CliCommand::Init => Ok(()),
    };
    if let Err(err) = &result {
        error!(event = "tofui_exit_error", error = %err);
    }
    result
}

fn build_context(config: &Config) -> anyhow::Result<HostContext> {
    let db_dir = config.db_dir();
    let store = Arc::new(
        SqliteStore::open_dir(&db_dir)
            .with_context(|| format!("opening database in {}", db_dir.display()))?,
    );
    if config.api.api_key.is_empty() {
        warn!(event = "api_key_missing");
    }
    let api = ApiClient::new(config.api_config()).context("building api client")?;
    let content: Arc<dyn ContentService> =
        Arc::new(CachedContentService::new(Arc::new(api), store.clone()));
    Ok(HostContext::new(
        Arc::new(SessionRegistry::new()),
        store,
        content,
        HostSettings::new(config.signin_base_url()),
    ))
}

async fn serve(config: &Config, ctx: HostContext) -> anyhow::Result<()> {
    let host_key = ssh::load_or_create_host_key(&config.host_key_path())?;
    let state = SigninState::new(&ctx, config.api.client_id.clone());
    let host = config.server.host.as_str();

    let http = signin::serve(state, host, config.server.http_port, shutdown_signal());
    let ssh = ssh::serve(ctx, host_key, host, config.server.ssh_port);
    tokio::select! {
        result = http => result.context("sign-in server")?,
        result = ssh => result?,
    }
    info!(event = "tofui_shutdown");
    Ok(())
}

async fn run_local(config: &Config, ctx: HostContext, compose: bool) -> anyhow::Result<()> {
    let state = SigninState::new(&ctx, config.api.client_id.clone());
    let host = config.server.host.clone();
    let port = config.server.http_port;
    let (stop, stopped) = oneshot::channel::<()>();
    let http = tokio::spawn(async move {
        let shutdown = async {
            let _ = stopped.await;
        };
        if let Err(err) = signin::serve(state, &host, port, shutdown).await {
            warn!(event = "signin_server_unavailable", error = %err);
        }
    });

    let result = local::run_local(&ctx, compose).await;
    let _ = stop.send(());
    let _ = http.await;
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(event = "signal_error", error = %err);
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_requested");
}
