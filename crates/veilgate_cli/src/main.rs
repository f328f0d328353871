//! Veilgate CLI
//!
//! Command-line tools for Veilgate key management, envelope creation and
//! decryption.
//!
//! # Commands
//!
//! - `decrypt` - Decrypt envelopes in a file or stdin
//! - `encrypt` - Seal a value into an envelope
//! - `keys` - Generate client keys
//! - `add-zone` - Generate a zone and print it as JSON
//! - `poison-record` - Generate a poison record
//! - `proxy` - Run the decrypting TCP proxy

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::decrypt::DecryptOptions;
use commands::encrypt::Recipient;
use commands::proxy::ProxyOptions;
use commands::{KeyDirs, PoisonActions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use veilgate_crypto::ZoneId;

/// Veilgate envelope encryption tools.
#[derive(Parser)]
#[command(name = "veilgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Key directory
    #[arg(global = true, short, long, default_value = ".veilgate/keys")]
    keys_dir: PathBuf,

    /// Separate directory for public keys
    #[arg(global = true, long)]
    public_keys_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Decryptor options shared by `decrypt` and `proxy`.
#[derive(Args)]
struct DecryptArgs {
    /// Client ID whose key opens envelopes
    #[arg(short, long)]
    client_id: Option<String>,

    /// Only decrypt envelopes that follow a zone ID
    #[arg(short, long)]
    zone_mode: bool,

    /// Do not compare content keys against the poison key
    #[arg(long)]
    no_poison_check: bool,

    /// Largest accepted payload length in bytes
    #[arg(long)]
    max_payload_len: Option<u64>,

    /// Script to run when a poison record is detected
    #[arg(long)]
    poison_script: Option<PathBuf>,

    /// Stop when a poison record is detected
    #[arg(long)]
    poison_shutdown: bool,
}

impl From<DecryptArgs> for DecryptOptions {
    fn from(args: DecryptArgs) -> Self {
        DecryptOptions {
            client_id: args.client_id,
            zone_mode: args.zone_mode,
            no_poison_check: args.no_poison_check,
            max_payload_len: args.max_payload_len,
            poison: PoisonActions {
                script: args.poison_script,
                shutdown: args.poison_shutdown,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt envelopes in a file or stdin
    Decrypt {
        #[command(flatten)]
        decrypt: DecryptArgs,

        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Seal a value into an envelope
    Encrypt {
        /// Client ID to encrypt for
        #[arg(short, long, conflicts_with = "zone_id", required_unless_present = "zone_id")]
        client_id: Option<String>,

        /// Zone ID to encrypt for
        #[arg(short, long)]
        zone_id: Option<String>,

        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write base64 instead of raw bytes
        #[arg(short, long)]
        base64: bool,
    },

    /// Generate a key pair for a client
    Keys {
        /// Client ID
        client_id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Generate a zone and print it as JSON
    AddZone,

    /// Generate a poison record
    PoisonRecord {
        /// Client ID whose public key seals the record
        #[arg(short, long)]
        client_id: String,

        /// Number of random data bytes
        #[arg(short, long, default_value = "100")]
        data_len: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write base64 instead of raw bytes
        #[arg(short, long)]
        base64: bool,
    },

    /// Run the decrypting TCP proxy
    Proxy {
        #[command(flatten)]
        decrypt: DecryptArgs,

        /// Listen address
        #[arg(long, default_value = "127.0.0.1:9393")]
        bind: SocketAddr,

        /// Database address
        #[arg(long)]
        upstream: SocketAddr,

        /// Maximum concurrent connections
        #[arg(long, default_value = "1000")]
        max_connections: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout may carry data
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let dirs = KeyDirs {
        private: cli.keys_dir,
        public: cli.public_keys_dir,
    };

    match cli.command {
        Commands::Decrypt {
            decrypt,
            input,
            output,
        } => {
            commands::decrypt::run(
                &dirs,
                &decrypt.into(),
                input.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::Encrypt {
            client_id,
            zone_id,
            input,
            output,
            base64,
        } => {
            let recipient = match (client_id, zone_id) {
                (_, Some(zone)) => Recipient::Zone(zone.parse::<ZoneId>()?),
                (Some(client), None) => Recipient::Client(client),
                (None, None) => return Err("--client-id or --zone-id required".into()),
            };
            commands::encrypt::run(
                &dirs,
                &recipient,
                input.as_deref(),
                output.as_deref(),
                base64,
            )?;
        }
        Commands::Keys { client_id, format } => {
            commands::keys::run(&dirs, &client_id, &format)?;
        }
        Commands::AddZone => {
            commands::add_zone::run(&dirs)?;
        }
        Commands::PoisonRecord {
            client_id,
            data_len,
            output,
            base64,
        } => {
            commands::poison_record::run(&dirs, &client_id, data_len, output.as_deref(), base64)?;
        }
        Commands::Proxy {
            decrypt,
            bind,
            upstream,
            max_connections,
        } => {
            let options = ProxyOptions {
                bind,
                upstream,
                max_connections,
                decrypt: decrypt.into(),
            };
            commands::proxy::run(&dirs, &options)?;
        }
        Commands::Version => {
            println!("Veilgate CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
