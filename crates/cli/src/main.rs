use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Operate the bookshelf record service.
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until interrupted
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the resolved settings as JSON
    Config,
}

fn apply_overrides(settings: &mut Settings, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    match cli.command {
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .context("failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Serve { host, port } => {
            apply_overrides(&mut settings, host, port);
            bookshelf_telemetry::init(&settings.telemetry)?;

            tracing::info!(
                env = ?settings.environment,
                addr = %settings.server.bind_addr(),
                "bookshelf serve"
            );

            let runtime = tokio::runtime::Runtime::new().context("failed to build tokio runtime")?;
            runtime.block_on(bookshelf_app::run(settings))
        }
    }
}
