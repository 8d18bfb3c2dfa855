//! Ties the node's process-wide state together: store, identity,
//! event channel, handlers, and server. Constructed once at start,
//! torn down once at stop.

use super::config::Config;
use super::events::EventPublisher;
use super::handlers::Handlers;
use super::identity;
use super::server::Server;
use super::store::Store;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] super::config::Error),
    #[error(transparent)]
    Store(#[from] super::store::Error),
    #[error(transparent)]
    Server(#[from] super::server::Error),
}

const PROXY_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Node {
    pub config: Config,
    pub events: EventPublisher,
    pub bank_code: String,
    store: Arc<Store>,
    server: Server,
}

impl Node {
    /// Loads config, resolves identity (persisting it on first boot),
    /// opens the store, and wires up handlers + server, without
    /// starting to listen yet.
    pub fn bootstrap(config_path: &Path, db_path: &Path) -> Result<(Self, std::sync::mpsc::Receiver<super::events::Event>), Error> {
        let mut config = Config::load(config_path)?;
        let bank_code = match config.bank.code.clone() {
            Some(code) => code,
            None => {
                let resolved = identity::resolve_outward_ipv4();
                config.persist_bank_code(&resolved)?;
                resolved
            }
        };

        let store = Arc::new(Store::open(db_path)?);
        let (events, rx) = EventPublisher::channel();
        let handlers = Arc::new(Handlers::new(
            Arc::clone(&store),
            bank_code.clone(),
            events.clone(),
            PROXY_TIMEOUT,
        ));
        let server = Server::new(handlers, events.clone(), SESSION_TIMEOUT);

        Ok((
            Self {
                config,
                events,
                bank_code,
                store,
                server,
            },
            rx,
        ))
    }

    /// The node's own account/ledger/known-banks store, for callers
    /// that need to inspect durable state directly (e.g. tests).
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn run(&mut self) -> Result<(), Error> {
        let host = self.config.p2p.host.clone();
        let port = self.config.p2p.port;
        self.server.start(&host, port)?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.server.stop();
    }

    pub fn is_running(&self) -> bool {
        self.server.is_running()
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.local_addr()
    }
}
