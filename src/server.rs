//! Bind/listen/accept loop, per-connection session loop, and
//! cooperative shutdown.

use super::dispatcher;
use super::events::{EventKind, EventPublisher};
use super::handlers::Handlers;
use super::protocol;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

type Connections = Arc<Mutex<HashMap<SocketAddr, TcpStream>>>;

/// `Stopped -> Running -> Stopping -> Stopped`.
pub struct Server {
    handlers: Arc<Handlers>,
    events: EventPublisher,
    session_timeout: Duration,
    is_running: Arc<AtomicBool>,
    connections: Connections,
    accept_thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(handlers: Arc<Handlers>, events: EventPublisher, session_timeout: Duration) -> Self {
        Self {
            handlers,
            events,
            session_timeout,
            is_running: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            accept_thread: None,
            local_addr: None,
        }
    }

    pub fn start(&mut self, host: &str, port: u16) -> Result<(), Error> {
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        self.local_addr = Some(listener.local_addr()?);
        self.is_running.store(true, Ordering::SeqCst);

        self.events
            .emit(EventKind::Info, format!("Server started on {host}:{port}"), now());
        info!(host, port, "server started");

        let is_running = Arc::clone(&self.is_running);
        let connections = Arc::clone(&self.connections);
        let handlers = Arc::clone(&self.handlers);
        let events = self.events.clone();
        let session_timeout = self.session_timeout;

        self.accept_thread = Some(std::thread::spawn(move || {
            accept_loop(listener, is_running, connections, handlers, events, session_timeout);
        }));
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        let mut connections = self.connections.lock().unwrap();
        for (addr, stream) in connections.drain() {
            debug!(%addr, "closing connection on shutdown");
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.events.emit(EventKind::Info, "Server stopped", now());
        info!("server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

fn accept_loop(
    listener: TcpListener,
    is_running: Arc<AtomicBool>,
    connections: Connections,
    handlers: Arc<Handlers>,
    events: EventPublisher,
    session_timeout: Duration,
) {
    while is_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let _ = stream.set_read_timeout(Some(session_timeout));
                if let Ok(clone) = stream.try_clone() {
                    connections.lock().unwrap().insert(addr, clone);
                }
                events.emit(EventKind::Connection, format!("accepted {addr}"), now());
                info!(%addr, "accepted connection");

                let is_running = Arc::clone(&is_running);
                let connections = Arc::clone(&connections);
                let handlers = Arc::clone(&handlers);
                let events = events.clone();
                std::thread::spawn(move || {
                    run_session(stream, addr, &is_running, &handlers, &events);
                    connections.lock().unwrap().remove(&addr);
                });
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                warn!(%err, "accept failed");
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn run_session(
    mut stream: TcpStream,
    addr: SocketAddr,
    is_running: &AtomicBool,
    handlers: &Handlers,
    events: &EventPublisher,
) {
    let peer_ip = addr.ip().to_string();
    let mut buf = [0u8; super::common::MAX_LINE_BYTES];

    while is_running.load(Ordering::SeqCst) {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                events.emit(EventKind::Warning, format!("Timeout on {addr}"), now());
                break;
            }
            Err(_) => break,
        };

        let line = String::from_utf8_lossy(&buf[..n]);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (opcode, args) = protocol::parse(line);
        events.emit(EventKind::Command, format!("{opcode} from {peer_ip}"), now());

        let response = dispatcher::dispatch(handlers, &opcode, &args, &peer_ip);
        events.emit(EventKind::Response, response.trim_end().to_string(), now());

        if stream.write_all(response.as_bytes()).is_err() {
            break;
        }
    }
    debug!(%addr, "session closed");
}
