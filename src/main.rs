use builder_monitor::infrastructure::{app::App, config::Config, logging};
use clap::{Args, Parser, Subcommand};
use std::process;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "builder-monitor", version, about = "Block builder fleet monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the builder monitor server
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Monitored builder RPC endpoints in the format `name=url`
    #[arg(long, env = "BMON_MONITOR_BUILDERS", value_delimiter = ',')]
    monitor_builders: Vec<String>,

    /// Interval at which to query builders for their status
    #[arg(long, env = "BMON_MONITOR_INTERVAL", value_parser = humantime::parse_duration)]
    monitor_interval: Option<Duration>,

    /// Known peer IPs in the format `label=ip`
    #[arg(long, env = "BMON_MONITOR_PEERS", value_delimiter = ',')]
    monitor_peers: Vec<String>,

    /// Timeout for RPC queries
    #[arg(long, env = "BMON_MONITOR_TIMEOUT", value_parser = humantime::parse_duration)]
    monitor_timeout: Option<Duration>,

    /// `host:port` for the server to listen on
    #[arg(long, env = "BMON_SERVER_LISTEN_ADDRESS")]
    server_listen_address: Option<String>,

    /// Log level
    #[arg(long, env = "BMON_LOG_LEVEL")]
    log_level: Option<String>,

    /// Format for logs, can be json or text
    #[arg(long, env = "BMON_LOG_FORMAT")]
    log_format: Option<String>,
}

impl ServeArgs {
    /// Layer explicitly-provided flags over the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if !self.monitor_builders.is_empty() {
            config.monitor.builders = self.monitor_builders.clone();
        }
        if let Some(interval) = self.monitor_interval {
            config.monitor.interval = interval;
        }
        if !self.monitor_peers.is_empty() {
            config.monitor.peers = self.monitor_peers.clone();
        }
        if let Some(timeout) = self.monitor_timeout {
            config.monitor.timeout = timeout;
        }
        if let Some(listen_address) = &self.server_listen_address {
            config.server.listen_address = listen_address.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) {
    let mut config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            process::exit(1);
        }
    };
    args.apply(&mut config);

    logging::init(&config.logging);

    if let Err(err) = config.validate() {
        error!(error = %err, "Configuration validation failed");
        process::exit(1);
    }

    let app = match App::new(config) {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "Failed to initialize builder monitor");
            process::exit(1);
        }
    };

    if let Err(err) = app.run().await {
        error!(error = %err, "Builder monitor failed");
        process::exit(1);
    }

    info!("Builder monitor shutdown complete");
}
