//! # glossa CLI Module
//!
//! This module implements the command-line interface for glossa.
//!
//! ## Available Commands
//!
//! - `build` - Build a snapshot from a TOML manifest
//! - `info` - Show snapshot counts
//! - `get` - Look up a languoid by code
//! - `guess` - Look up a languoid without naming the identifier type
//! - `convert` - Translate a code between identifier schemes
//! - `search` - Find languoids by name
//! - `tree` - Show a languoid's ancestors and children
//! - `names` - Show a languoid's names in every locale
//! - `validate` - Run the consistency checks
//! - `hash` - Compute the BLAKE3 digest of the canonical snapshot

mod commands;

use clap::{Parser, Subcommand};
use glossa_core::{GlossaError, IdType, SnapshotFormat};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// glossa - canonical identities for languages, scripts and regions
///
/// Builds one merged graph from several identifier sources and answers
/// lookups against it.
#[derive(Parser, Debug)]
#[command(name = "glossa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the snapshot
    #[arg(short = 'D', long, global = true, default_value = "data/glossa.json.gz")]
    pub database: PathBuf,

    /// Snapshot format: json, json.gz or msgpack.gz (default: from the file suffix)
    #[arg(short = 'F', long, global = true)]
    pub format: Option<SnapshotFormat>,

    /// Name archive (default: names.redb next to the snapshot, when present)
    #[arg(short = 'N', long, global = true)]
    pub names: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a snapshot from the sources listed in a manifest
    Build {
        /// Path to the TOML build manifest
        #[arg(short, long, default_value = "glossa.toml")]
        config: PathBuf,
    },

    /// Show snapshot counts
    Info,

    /// Look up a languoid by code
    Get {
        code: String,

        /// Identifier type of the code
        #[arg(short = 't', long, default_value = "bcp_47")]
        id_type: IdType,
    },

    /// Look up a languoid, trying every identifier type
    Guess { code: String },

    /// Translate a code between identifier schemes
    Convert {
        code: String,

        #[arg(long)]
        from: IdType,

        #[arg(long)]
        to: IdType,
    },

    /// Find languoids whose name or endonym contains the query
    Search {
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a languoid's ancestors and children
    Tree {
        code: String,

        #[arg(short = 't', long, default_value = "bcp_47")]
        id_type: IdType,

        /// Descendant depth to show (0 = unlimited)
        #[arg(short, long, default_value = "1")]
        depth: usize,
    },

    /// Show a languoid's names
    Names {
        code: String,

        #[arg(short = 't', long, default_value = "bcp_47")]
        id_type: IdType,

        /// Only the name in this locale (BCP-47 code)
        #[arg(short, long)]
        locale: Option<String>,
    },

    /// Run the consistency checks and print the report
    Validate,

    /// Compute the BLAKE3 digest of the canonical snapshot
    Hash {
        /// Compare against this digest and fail on mismatch
        #[arg(long)]
        expect: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GlossaError> {
    let ctx = Context {
        database: cli.database,
        format: cli.format,
        names: cli.names,
        json: cli.json,
    };

    match cli.command {
        Some(Commands::Build { config }) => cmd_build(&config, ctx.json),
        Some(Commands::Info) | None => cmd_info(&ctx),
        Some(Commands::Get { code, id_type }) => cmd_get(&ctx, &code, id_type),
        Some(Commands::Guess { code }) => cmd_guess(&ctx, &code),
        Some(Commands::Convert { code, from, to }) => cmd_convert(&ctx, &code, from, to),
        Some(Commands::Search { query, limit }) => cmd_search(&ctx, &query, limit),
        Some(Commands::Tree {
            code,
            id_type,
            depth,
        }) => cmd_tree(&ctx, &code, id_type, depth),
        Some(Commands::Names {
            code,
            id_type,
            locale,
        }) => cmd_names(&ctx, &code, id_type, locale.as_deref()),
        Some(Commands::Validate) => cmd_validate(&ctx),
        Some(Commands::Hash { expect }) => cmd_hash(&ctx, expect.as_deref()),
    }
}
