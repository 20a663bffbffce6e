use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Option-lock control daemon
#[derive(Parser, Debug)]
#[command(name = "optlockd", version, about = "Live option lock/unlock control server")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Serve POST /options/lock and /options/unlock
    ///
    /// Example:
    ///   optlockd serve --options-file options.json --listen 0.0.0.0:8089 --host mitm.code
    Serve {
        /// Config file (TOML). CLI flags override config values.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address
        #[arg(long)]
        listen: Option<String>,
        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,
        /// Only serve requests whose Host header matches
        #[arg(long)]
        host: Option<String>,
        /// JSON option table
        #[arg(long)]
        options_file: Option<PathBuf>,
        /// Request body cap in bytes
        #[arg(long)]
        max_body_bytes: Option<usize>,
        /// Shut down (and unlock, if configured) once stdin is closed
        #[arg(long, default_value_t = false)]
        until_stdin_eof: bool,
    },
    /// Load an option table and print its declarations (--json for JSON)
    Options {
        #[arg(long)]
        options_file: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
