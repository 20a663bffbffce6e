use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_options;
mod cmd_serve;

fn init_logger() {
    // RUST_LOG overrides; default is info.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Serve { config, listen, workers, host, options_file, max_body_bytes, until_stdin_eof } =>
            cmd_serve::exec(cmd_serve::ServeArgs {
                config,
                listen,
                workers,
                host,
                options_file,
                max_body_bytes,
                until_stdin_eof,
            }),

        cli::Cmd::Options { options_file, json } =>
            cmd_options::exec(options_file, json),
    }
}
