use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const LINE_TIMEOUT: Duration = Duration::from_secs(10);

fn post(addr: SocketAddr, path: &str, body: &str) -> Result<u16> {
    let mut s = TcpStream::connect(addr).context("connect")?;
    s.set_read_timeout(Some(Duration::from_secs(5)))?;
    let req = format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        body.len(),
        body
    );
    s.write_all(req.as_bytes())?;
    let mut raw = String::new();
    s.read_to_string(&mut raw)?;
    raw.split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow!("no status line in {:?}", raw))?
        .parse::<u16>()
        .map_err(Into::into)
}

#[test]
fn closing_stdin_stops_daemon_and_unlocks() -> Result<()> {
    let table = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/options.json");
    let mut child = Command::new(env!("CARGO_BIN_EXE_optlockd"))
        .args(["serve", "--listen", "127.0.0.1:0", "--workers", "1", "--until-stdin-eof"])
        .arg("--options-file")
        .arg(&table)
        .env("RUST_LOG", "info")
        .env_remove("OPTLOCK_HOST")
        .env_remove("OPTLOCK_UNLOCK_ON_SHUTDOWN")
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn optlockd")?;

    let stderr = child.stderr.take().ok_or_else(|| anyhow!("no stderr"))?;
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let addr: SocketAddr = loop {
        let line = rx.recv_timeout(LINE_TIMEOUT).context("waiting for listen line")?;
        if let Some((_, rest)) = line.split_once("listening on ") {
            let a = rest.split_whitespace().next().unwrap_or_default();
            break a.parse().with_context(|| format!("parse address from {:?}", line))?;
        }
    };

    assert_eq!(post(addr, "/options/lock", r#"{"options": {"timeout": 30}}"#)?, 200);

    // closing the pipe is the shutdown signal
    drop(child.stdin.take());

    let mut restored = false;
    loop {
        let line = rx.recv_timeout(LINE_TIMEOUT).context("waiting for shutdown")?;
        if line.contains("unlocking options back to") && line.contains(r#"{"timeout":10}"#) {
            restored = true;
        }
        if line.contains("option control stopped") {
            break;
        }
    }
    assert!(restored, "shutdown must restore the locked option");

    let status = child.wait()?;
    assert!(status.success(), "exit status {:?}", status);
    Ok(())
}
