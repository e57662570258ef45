use std::path::PathBuf;
use std::sync::Arc;

use aquad::api;
use aquad::format_diagnostics;
use aquad::Config;
use aquad::Engine;
use clap::Parser;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Aquarea heat pump bridge daemon
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config files, merged in order (earlier files win on conflicts)
    #[arg(default_value = "aquad.toml")]
    configs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, diagnostics) = match Config::from_files(&cli.configs) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if !diagnostics.is_empty() {
        eprint!("{}", format_diagnostics(&diagnostics));
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets())
        .init();

    info!("aquad starting");
    for path in &cli.configs {
        info!("Loaded config from: {}", path.display());
    }

    let engine = Arc::new(Engine::new());
    engine.register_integrations_from_config(&config);

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                error!("Engine stopped: {}", e);
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = tokio::spawn(api::serve(
        config.api.listen.clone(),
        config.api.port,
        engine.clone(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Received ctrl-c, shutting down");

    shutdown_tx.send(()).ok();
    match api_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP API server failed: {:#}", e),
        Err(e) => error!("HTTP API task ended abnormally: {}", e),
    }

    engine.shutdown().await;
    engine_task.abort();

    info!("aquad stopped");
    Ok(())
}
