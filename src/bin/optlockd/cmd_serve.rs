use anyhow::{Context, Result};
use log::{info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use optlock::{ControlConfig, ControlServer, FileConfig, MemoryStore, OptionLockController, OptionTable};

pub struct ServeArgs {
    pub config: Option<PathBuf>,
    pub listen: Option<String>,
    pub workers: Option<usize>,
    pub host: Option<String>,
    pub options_file: Option<PathBuf>,
    pub max_body_bytes: Option<usize>,
    pub until_stdin_eof: bool,
}

pub fn exec(args: ServeArgs) -> Result<()> {
    let cfg = effective_config(&args)?;
    info!("{}", cfg);

    let table = match &cfg.options_file {
        Some(p) => OptionTable::load(p)?,
        None => {
            warn!("no option table configured; every lock will be rejected");
            OptionTable::new()
        }
    };
    info!("serving {} options", table.len());

    let store = Arc::new(MemoryStore::from_table(table));
    let controller = Arc::new(OptionLockController::new(store));
    let handle = ControlServer::bind(&cfg, controller)
        .context("start control server")?
        .spawn()?;

    if !args.until_stdin_eof {
        return handle.wait();
    }
    // the supervising driver closes our stdin to stop us
    io::copy(&mut io::stdin().lock(), &mut io::sink()).context("read stdin")?;
    info!("stdin closed, shutting down");
    handle.shutdown()
}

// CLI > config file > env > default
fn effective_config(args: &ServeArgs) -> Result<ControlConfig> {
    let mut cfg = ControlConfig::from_env();
    if let Some(p) = &args.config {
        cfg = cfg.merge_file(&FileConfig::load(p)?);
    }
    if let Some(v) = &args.listen {
        cfg = cfg.with_listen_addr(v.clone());
    }
    if let Some(n) = args.workers {
        cfg = cfg.with_workers(n);
    }
    if args.host.is_some() {
        cfg = cfg.with_control_host(args.host.clone());
    }
    if args.options_file.is_some() {
        cfg = cfg.with_options_file(args.options_file.clone());
    }
    if let Some(n) = args.max_body_bytes {
        cfg = cfg.with_max_body_bytes(n);
    }
    Ok(cfg.build())
}
