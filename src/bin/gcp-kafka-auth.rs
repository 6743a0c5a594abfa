use anyhow::Result;
use clap::{Parser, Subcommand};
use gcp_kafka_auth::config::loader;
use gcp_kafka_auth::observability::service_resources_metrics::collect_process_metrics;
use gcp_kafka_auth::server;
use gcp_kafka_auth::server::handler::AuthHandlerBuilder;
use gcp_kafka_auth::utils::logging::{self, LogLevel};
use gcp_kafka_auth::utils::version::VersionInfo;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the token server
    Serve {
        #[arg(short, long, env = "CONFIG")]
        config: Option<String>,
        #[arg(long, env = "LOG_LEVEL", value_enum)]
        log_level: Option<LogLevel>,
        /// Overrides settings.server.port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
    /// Print version information as JSON
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    match Args::parse().command {
        Command::Version => {
            println!("{}", VersionInfo::current().to_json()?);
            Ok(())
        }
        Command::Serve {
            config,
            log_level,
            port,
        } => serve(config.as_deref(), log_level, port).await,
    }
}

async fn serve(config: Option<&str>, log_level: Option<LogLevel>, port: Option<u16>) -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let service_config = loader::run(config, port).await?;
    logging::run(&service_config, log_level);
    info!("Version: v{}", env!("CARGO_PKG_VERSION"));

    // -------------------------------
    // 2. Build token handler with default credentials
    // -------------------------------

    let auth_handler = AuthHandlerBuilder::new()
        .with_credentials_config(&service_config.credentials)
        .build();
    info!("requesting credentials for scope {}", auth_handler.scope());

    // -------------------------------
    // 3. Serve until shutdown, sampling process metrics alongside
    // -------------------------------

    let http_server = server::server::start(&service_config.settings, auth_handler);
    let service_metrics = collect_process_metrics(service_config.settings.metrics.is_enabled);

    tokio::select! {
        res = http_server => res?,
        res = service_metrics => res?,
    }
    info!("Service stopped");
    Ok(())
}
