use clap::Parser;
use opwait::{ActionRateLimiter, Context};
use std::sync::Arc;
use tencentcloud::api::ConnectionPoolConfig;
use tencentcloud::cli::{self, WaitCli};
use tencentcloud::{Client, ProviderConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = WaitCli::parse();
    let config = ProviderConfig::from_env()?;
    let client = Client::with_config(
        config,
        Arc::new(ActionRateLimiter::default()),
        ConnectionPoolConfig::default(),
    )?;

    let ctx = Context::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[{}] interrupted, cancelling wait", cancel.log_id());
            cancel.cancel();
        }
    });

    match cli::run(&ctx, client, &args.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            tracing::error!("[{}] {}", ctx.log_id(), e);
            std::process::exit(e.exit_code());
        }
    }
}
