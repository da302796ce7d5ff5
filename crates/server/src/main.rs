use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;

mod api;
mod config;
mod invoke;

use config::{AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "promgate")]
#[command(about = "MCP gateway for Amazon Managed Service for Prometheus", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "promgate.toml", env = "PROMGATE_CONFIG", global = true)]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Listener used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PROMGATE_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "PROMGATE_HOST")]
    host: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// Handle one API Gateway event (or bare JSON-RPC request) and exit
    Invoke {
        /// File holding the event; stdin when omitted
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "promgate=info,tower_http=info".into());

    // stdout carries the invoke response, so logs always go to stderr
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    // Load configuration
    let config = ServerConfig::load(&args.config)?;
    let aws = config.aws_settings(|name| std::env::var(name).ok())?;
    let state = AppState::new(config, aws)?;

    match args.command.unwrap_or(Command::Serve(args.serve)) {
        Command::Serve(ServeArgs { port, host }) => {
            let addr = format!("{}:{}", host, port);
            tracing::info!("Starting API server on {}", addr);
            api::serve(&addr, state).await?;
        }
        Command::Invoke { event } => {
            let raw = match event {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read event file {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read event from stdin")?;
                    buf
                }
            };
            let event: serde_json::Value =
                serde_json::from_str(&raw).context("Event is not valid JSON")?;

            let response = invoke::invoke_event(state, event).await;
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let args = Args::try_parse_from(argv).unwrap();
        match args.command.unwrap_or(Command::Serve(args.serve)) {
            Command::Serve(serve) => serve,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_mode_takes_listener_options() {
        let serve = serve_args(&["promgate", "--port", "9100", "--host", "0.0.0.0"]);
        assert_eq!(serve.port, 9100);
        assert_eq!(serve.host, "0.0.0.0");

        let serve = serve_args(&["promgate", "serve", "--port", "9200"]);
        assert_eq!(serve.port, 9200);
    }

    #[test]
    fn test_default_mode_reads_environment() {
        std::env::set_var("PROMGATE_PORT", "9300");
        std::env::set_var("PROMGATE_HOST", "10.0.0.1");
        let serve = serve_args(&["promgate"]);
        std::env::remove_var("PROMGATE_PORT");
        std::env::remove_var("PROMGATE_HOST");

        assert_eq!(serve.port, 9300);
        assert_eq!(serve.host, "10.0.0.1");
    }

    #[test]
    fn test_invoke_subcommand() {
        let args = Args::try_parse_from(["promgate", "invoke", "--event", "event.json"]).unwrap();
        match args.command {
            Some(Command::Invoke { event }) => {
                assert_eq!(event, Some(PathBuf::from("event.json")));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
