//! HTTP transport for the control endpoint (tiny_http).
//!
//! `workers` threads share one `tiny_http::Server` and pull requests off it.
//! The controller serializes lock/unlock itself, so workers need no
//! coordination beyond the stop flag.

use anyhow::{anyhow, Result};
use log::{info, warn};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

use crate::config::ControlConfig;
use crate::controller::OptionLockController;
use crate::endpoint::{self, ControlResponse};
use crate::error::ControlError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ControlServer {
    server: Arc<Server>,
    controller: Arc<OptionLockController>,
    cfg: ControlConfig,
}

impl ControlServer {
    pub fn bind(cfg: &ControlConfig, controller: Arc<OptionLockController>) -> Result<Self> {
        let server = Server::http(&cfg.listen_addr)
            .map_err(|e| anyhow!("bind http at {}: {}", cfg.listen_addr, e))?;
        Ok(Self {
            server: Arc::new(server),
            controller,
            cfg: cfg.clone(),
        })
    }

    /// Bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the process exits.
    pub fn run(self) -> Result<()> {
        self.spawn()?.wait()
    }

    /// Serve on background threads.
    pub fn spawn(self) -> Result<ServerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let addr = self.local_addr();
        info!(
            "option control listening on {} ({} workers)",
            addr.map(|a| a.to_string())
                .unwrap_or_else(|| self.cfg.listen_addr.clone()),
            self.cfg.workers
        );

        let mut threads = Vec::with_capacity(self.cfg.workers);
        for i in 0..self.cfg.workers.max(1) {
            let worker = Worker {
                server: self.server.clone(),
                controller: self.controller.clone(),
                host: self.cfg.control_host.clone(),
                max_body_bytes: self.cfg.max_body_bytes,
                stop: stop.clone(),
            };
            let t = thread::Builder::new()
                .name(format!("optlock-http-{}", i))
                .spawn(move || worker.run())
                .map_err(|e| anyhow!("spawn control worker: {}", e))?;
            threads.push(t);
        }

        Ok(ServerHandle {
            server: self.server,
            controller: self.controller,
            unlock_on_shutdown: self.cfg.unlock_on_shutdown,
            addr,
            stop,
            threads,
        })
    }
}

pub struct ServerHandle {
    server: Arc<Server>,
    controller: Arc<OptionLockController>,
    unlock_on_shutdown: bool,
    addr: Option<SocketAddr>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Block on the workers. They only return once stopped or after a panic.
    pub fn wait(self) -> Result<()> {
        for t in self.threads {
            t.join().map_err(|_| anyhow!("control worker panicked"))?;
        }
        Ok(())
    }

    /// Stop the workers, then release any active lock if configured to.
    pub fn shutdown(self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        for _ in &self.threads {
            self.server.unblock();
        }
        for t in self.threads {
            if t.join().is_err() {
                warn!("control worker panicked");
            }
        }
        if self.unlock_on_shutdown {
            self.controller
                .unlock()
                .map_err(|e| anyhow!("unlock on shutdown: {}", e))?;
        }
        info!("option control stopped");
        Ok(())
    }
}

struct Worker {
    server: Arc<Server>,
    controller: Arc<OptionLockController>,
    host: Option<String>,
    max_body_bytes: usize,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        while !self.stop.load(Ordering::SeqCst) {
            match self.server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(rq)) => self.serve(rq),
                Ok(None) => {}
                Err(e) => {
                    if !self.stop.load(Ordering::SeqCst) {
                        warn!("http recv error: {}", e);
                    }
                }
            }
        }
    }

    fn serve(&self, mut rq: Request) {
        let resp = if !self.host_matches(&rq) {
            ControlResponse::not_found()
        } else {
            let expected = rq.body_length();
            match read_body(rq.as_reader(), expected, self.max_body_bytes) {
                Ok(body) => endpoint::handle(
                    &self.controller,
                    rq.method().as_str(),
                    rq.url(),
                    &body,
                ),
                Err(resp) => resp,
            }
        };

        let status = resp.status;
        let mut out = Response::from_string(resp.body).with_status_code(status);
        if let Ok(ct) = Header::from_bytes(&b"Content-Type"[..], resp.content_type.as_bytes()) {
            out.add_header(ct);
        }
        if let Err(e) = rq.respond(out) {
            warn!("http respond error: {}", e);
        }
    }

    fn host_matches(&self, rq: &Request) -> bool {
        let Some(want) = self.host.as_deref() else {
            return true;
        };
        rq.headers()
            .iter()
            .find(|h| h.field.equiv("Host"))
            .map(|h| strip_port(h.value.as_str()).eq_ignore_ascii_case(want))
            .unwrap_or(false)
    }
}

/// Read at most `limit` bytes. Oversized bodies get 413; read errors and
/// bodies shorter than the declared Content-Length get 400.
fn read_body<R: Read>(
    body: R,
    expected: Option<usize>,
    limit: usize,
) -> std::result::Result<Vec<u8>, ControlResponse> {
    let mut buf = Vec::new();
    let cap = limit as u64 + 1;
    if let Err(e) = body.take(cap).read_to_end(&mut buf) {
        warn!("read request body: {}", e);
        return Err(ControlResponse::from_error(&ControlError::malformed(format!(
            "read request body: {}",
            e
        ))));
    }
    if buf.len() > limit {
        return Err(ControlResponse::payload_too_large(limit));
    }
    if let Some(n) = expected {
        if buf.len() < n {
            return Err(ControlResponse::from_error(&ControlError::malformed(format!(
                "truncated body: got {} of {} bytes",
                buf.len(),
                n
            ))));
        }
    }
    Ok(buf)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [v6]:port
        return host.split(']').next().map(|h| &h[1..]).unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}
