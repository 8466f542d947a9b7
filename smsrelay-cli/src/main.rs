mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;

const DEFAULT_CONFIG: &str = "~/.config/smsrelay/config.toml";

#[derive(Parser)]
#[command(name = "smsrelay")]
#[command(version)]
#[command(about = "Relay notification requests to an SMS provider")]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP relay server
    Serve {
        /// Server bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Server port number (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Relay a single envelope (push envelope or direct payload)
    ///
    /// Examples:
    ///   smsrelay send envelope.json
    ///   echo '{"type":"test","to":"+15551234567","body":"hi"}' | smsrelay send -
    Send {
        /// JSON file holding the envelope, or '-' for stdin
        input: String,
    },

    /// Drain a subscription for a bounded window and print the session report
    Drain {
        /// Subscription to drain (defaults to drain.subscription_name)
        #[arg(short, long)]
        subscription: Option<String>,

        /// Listening window in seconds
        #[arg(short, long)]
        window: Option<u64>,

        /// Maximum messages admitted in this session
        #[arg(short, long)]
        max_messages: Option<usize>,

        /// Acknowledge messages even when delivery fails
        #[arg(long)]
        always_ack: Option<bool>,

        /// Drain newline-delimited JSON payloads from a file instead of Pub/Sub
        #[arg(long)]
        from_file: Option<String>,
    },

    /// Write a default configuration file
    Config {
        /// Start interactive configuration setup
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            handlers::handle_serve(&cli.config, host, port).await?;
        }
        Commands::Send { input } => {
            handlers::handle_send(&cli.config, &input).await?;
        }
        Commands::Drain {
            subscription,
            window,
            max_messages,
            always_ack,
            from_file,
        } => {
            let request = smsrelay_core::models::DrainRequest {
                subscription_name: subscription,
                window_duration: window,
                max_messages,
                always_ack,
            };
            handlers::handle_drain(&cli.config, request, from_file).await?;
        }
        Commands::Config { init } => {
            if init {
                handlers::handle_config_init(&cli.config).await?;
            } else {
                println!("Config command requires --init flag");
                println!("Usage: smsrelay config --init [--config PATH]");
            }
        }
    }

    Ok(())
}
