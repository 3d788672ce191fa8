//! # glossa
//!
//! The command-line binary for the glossa identity graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/glossa (THE BINARY)              │
//! │                                                      │
//! │  ┌─────────────┐            ┌──────────────────┐    │
//! │  │   CLI       │            │  Build manifest  │    │
//! │  │  (clap)     │            │  (toml)          │    │
//! │  └──────┬──────┘            └────────┬─────────┘    │
//! │         └──────────────┬─────────────┘              │
//! │                        ▼                            │
//! │                ┌───────────────┐                    │
//! │                │  glossa-core  │                    │
//! │                └───────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Build a snapshot from the sources listed in a manifest
//! glossa build --config glossa.toml
//!
//! # Lookups
//! glossa -D data/glossa.json.gz get nl
//! glossa -D data/glossa.json.gz convert dutc1256 --from glottocode --to bcp_47
//! ```

use clap::Parser;
use glossa::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // GLOSSA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("GLOSSA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.quiet {
        "glossa=warn,glossa_core=warn"
    } else if cli.verbose {
        "glossa=debug,glossa_core=debug"
    } else {
        "glossa=info,glossa_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so `--json` output on stdout stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
