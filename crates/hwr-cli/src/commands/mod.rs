//! Commands - CLI Command Implementations
//!
//! Every command except `login` runs the navigation guard against the stored
//! session before touching the network.
//!
//! @version 0.1.0

pub mod auth;
pub mod datasets;
pub mod logs;
pub mod models;
pub mod status;
pub mod train;

pub(crate) mod utils;

use hwr_console::{ConsoleConfig, ConsoleServices, Navigation, Route, Session, SessionStore};
use std::path::Path;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Configuration and session store shared by all commands
pub struct Context {
    pub config: ConsoleConfig,
    pub store: SessionStore,
}

impl Context {
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => ConsoleConfig::load_from_path(path)?,
            None => ConsoleConfig::load()?,
        };
        config.validate()?;

        let store = SessionStore::new(config.session_file());
        debug!(session = %store.path().display(), "Loaded configuration");
        Ok(Self { config, store })
    }

    pub fn services(&self) -> CliResult<ConsoleServices> {
        Ok(ConsoleServices::new(&self.config.services)?)
    }

    /// Session allowed to visit `route`, or `NotLoggedIn`
    pub fn require(&self, route: Route) -> CliResult<Session> {
        let (navigation, session) = self.store.navigate(route)?;
        match navigation {
            Navigation::Proceed(_) => Ok(session),
            Navigation::Redirect(_) => Err(CliError::NotLoggedIn),
        }
    }

    /// Record a user action in the operation log
    pub async fn record(&self, services: &ConsoleServices, session: &Session, action: &str) {
        services.logs.append(session.user_id.as_deref(), action).await;
    }
}
