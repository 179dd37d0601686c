use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragground::config::Config;
use ragground::mcp::server::{McpContext, McpServer};
use ragground::models::Query;
use ragground::server;
use ragground::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Grounded question answering over an indexed document corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve `POST /api/rag` over HTTP
    Serve {
        #[arg(short, long, env = "RAG_CONFIG", default_value = "config.json")]
        config: String,

        /// Overrides `server.bind` from the config
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Serve the `ask` tool over MCP stdio
    Stdio {
        #[arg(short, long, env = "RAG_CONFIG", default_value = "config.json")]
        config: String,
    },
    /// Answer one question and print the JSON response
    Ask {
        #[arg(short, long, env = "RAG_CONFIG", default_value = "config.json")]
        config: String,

        message: String,
    },
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Cancel every in-flight request on Ctrl-C.
fn spawn_ctrl_c(state: &Arc<AppState>) {
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol in stdio mode, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => {
            let mut config = load_config(&config)?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let state = AppState::initialize(&config).await?;
            spawn_ctrl_c(&state);

            let listener = TcpListener::bind(&config.server.bind)
                .await
                .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
            server::serve(listener, state).await?;
        }
        Commands::Stdio { config } => {
            let config = load_config(&config)?;
            let state = AppState::initialize(&config).await?;
            spawn_ctrl_c(&state);

            McpServer::new(McpContext::from(state.as_ref())).start().await?;
        }
        Commands::Ask { config, message } => {
            let config = load_config(&config)?;
            let state = AppState::initialize(&config).await?;
            spawn_ctrl_c(&state);

            let answer = state
                .pipeline
                .handle(&Query::new(message), &state.shutdown)
                .await
                .map_err(|e| anyhow::anyhow!("{}: {e}", e.kind()))?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
    }

    Ok(())
}
