use clap::{Args, Parser, Subcommand};

/// TTL cache in front of an MCP search agent
#[derive(Debug, Parser)]
#[command(name = "searchcache", version, about)]
pub struct Cli {
    /// Force debug logging (same as logging.debug = true)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up a query, searching only on a cache miss
    Search {
        /// Query text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// TTL in seconds for a freshly cached result
        #[arg(long, value_name = "SECS")]
        ttl: Option<u64>,

        /// Print the lookup as a JSON document
        #[arg(long)]
        json: bool,
    },

    /// Show hit rate, tokens saved and top queries
    Stats {
        /// Only count lookups from the last SECS seconds
        #[arg(long, value_name = "SECS")]
        window: Option<u64>,
    },

    /// Drop cached entries
    Clear(ClearArgs),

    /// Drop expired cache entries
    Purge,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ClearArgs {
    /// Reset lookup statistics instead of cached entries
    #[arg(long)]
    pub stats: bool,

    /// Drop cached entries and reset lookup statistics
    #[arg(long)]
    pub all: bool,
}
