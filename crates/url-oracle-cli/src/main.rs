//! url-oracle CLI - create and verify signed observations of URL content.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod fetch;
mod github;
mod output;

use commands::{canonicalize, check, generate, inspect, verify};
use config::{ActionsArgs, ExpectationArgs, ProviderArgs, StoreArgs};

#[derive(Parser)]
#[command(name = "url-oracle", version)]
#[command(about = "Attest to the content of a URL from a CI identity, and verify such attestations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL and write a signed attestation of its content
    Generate {
        /// URL to observe
        url: String,
        /// Where to write the attestation
        #[arg(short, long, default_value = "attestation.json")]
        output: PathBuf,
        /// Also write a chain pointer to the new attestation here
        #[arg(long)]
        details: Option<PathBuf>,
        /// Do not look up the previous attestation
        #[arg(long)]
        skip_chain_link: bool,
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        actions: ActionsArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Verify an attestation file
    Verify {
        /// Path to attestation file
        attestation: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        expectations: ExpectationArgs,
    },
    /// Report whether content differs from a previous attestation
    Check {
        /// URL whose current content to compare
        #[arg(long, required_unless_present = "file")]
        url: Option<String>,
        /// Local file whose content to compare
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        /// Previous attestation file
        #[arg(long)]
        previous: Option<PathBuf>,
    },
    /// Show an attestation's payload and identity claims
    Inspect {
        /// Path to attestation file
        attestation: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the canonical hash input of a payload or attestation
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
    },
}

fn init_logging(verbose: u8, json_logs: bool) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let result = match cli.command {
        Commands::Generate {
            url,
            output,
            details,
            skip_chain_link,
            provider,
            actions,
            store,
        } => generate::run(url, output, details, skip_chain_link, provider, actions, store),
        Commands::Verify {
            attestation,
            json,
            provider,
            expectations,
        } => verify::run(attestation, json, provider, expectations),
        Commands::Check {
            url,
            file,
            previous,
        } => check::run(url, file, previous),
        Commands::Inspect { attestation, json } => inspect::run(attestation, json),
        Commands::Canonicalize { input } => canonicalize::run(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
