//! Console session and navigation guard
//!
//! The session is a token plus the logged-in user id, persisted as JSON.
//! Only the exact marker token counts as logged in; anything else found in
//! the store is treated as stale and cleared by the guard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Token value stored after a successful login
pub const AUTH_MARKER: &str = "authenticated";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt session file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown route '{0}'")]
    UnknownRoute(String),
}

// =============================================================================
// Routes
// =============================================================================

/// Console pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Datasets,
    Training,
    Models,
    Logs,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Self::Home,
        Self::Login,
        Self::Datasets,
        Self::Training,
        Self::Models,
        Self::Logs,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Datasets => "/datasets",
            Self::Training => "/training",
            Self::Models => "/models",
            Self::Logs => "/logs",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Login => "login",
            Self::Datasets => "datasets",
            Self::Training => "training",
            Self::Models => "models",
            Self::Logs => "logs",
        }
    }

    /// Follow static redirects; home lands on the dataset page
    pub fn resolve(self) -> Self {
        match self {
            Self::Home => Self::Datasets,
            other => other,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = SessionError;

    /// Accepts a path (`/models`) or a route name (`models`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('/');
        Self::ALL
            .into_iter()
            .find(|route| {
                route.name() == s || route.path() == s || route.path() == trimmed
                    || (trimmed.is_empty() && *route == Self::Home)
            })
            .ok_or_else(|| SessionError::UnknownRoute(s.to_string()))
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Session {
    /// Session of a freshly logged-in user
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            auth_token: Some(AUTH_MARKER.to_string()),
            user_id: Some(user_id.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.as_deref() == Some(AUTH_MARKER)
    }

    pub fn clear(&mut self) {
        self.auth_token = None;
        self.user_id = None;
    }
}

/// Outcome of a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed(Route),
    Redirect(Route),
}

impl Navigation {
    /// Page finally shown
    pub fn target(&self) -> Route {
        match self {
            Self::Proceed(route) | Self::Redirect(route) => route.resolve(),
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }
}

/// Decide whether `session` may visit `to`.
///
/// Clears `session` when it carries a token other than the marker and the
/// visit is redirected to the login page.
pub fn guard(to: Route, session: &mut Session) -> Navigation {
    let to = to.resolve();
    let authenticated = session.is_authenticated();

    if to == Route::Login && authenticated {
        return Navigation::Redirect(Route::Home);
    }

    if to != Route::Login && !authenticated {
        if session.auth_token.is_some() {
            debug!("Clearing invalid session token");
            session.clear();
        }
        return Navigation::Redirect(Route::Login);
    }

    Navigation::Proceed(to)
}

// =============================================================================
// Session Store
// =============================================================================

/// JSON file holding the session between invocations
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored session; empty when no file exists
    pub fn load(&self) -> Result<Session, SessionError> {
        if !self.path.exists() {
            return Ok(Session::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Session::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Session cleared");
        }
        Ok(())
    }

    /// Run the guard against the stored session, persisting any clearing
    pub fn navigate(&self, to: Route) -> Result<(Navigation, Session), SessionError> {
        let mut session = self.load()?;
        let before = session.clone();
        let navigation = guard(to, &mut session);
        if session != before {
            self.save(&session)?;
        }
        Ok((navigation, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token(token: &str) -> Session {
        Session {
            auth_token: Some(token.to_string()),
            user_id: Some("7".to_string()),
        }
    }

    #[test]
    fn test_route_parsing() {
        assert_eq!("/".parse::<Route>().unwrap(), Route::Home);
        assert_eq!("".parse::<Route>().unwrap(), Route::Home);
        assert_eq!("/models".parse::<Route>().unwrap(), Route::Models);
        assert_eq!("/logs/".parse::<Route>().unwrap(), Route::Logs);
        assert_eq!("training".parse::<Route>().unwrap(), Route::Training);
        assert!("/admin".parse::<Route>().is_err());
        assert_eq!(Route::Home.resolve(), Route::Datasets);
    }

    #[test]
    fn test_guard_authenticated() {
        let mut session = Session::authenticated("1");

        assert_eq!(guard(Route::Models, &mut session), Navigation::Proceed(Route::Models));
        assert_eq!(guard(Route::Home, &mut session), Navigation::Proceed(Route::Datasets));

        let login = guard(Route::Login, &mut session);
        assert_eq!(login, Navigation::Redirect(Route::Home));
        assert_eq!(login.target(), Route::Datasets);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_guard_without_token() {
        let mut session = Session::default();

        for route in [Route::Home, Route::Datasets, Route::Training, Route::Models, Route::Logs] {
            assert_eq!(guard(route, &mut session), Navigation::Redirect(Route::Login));
        }
        assert_eq!(guard(Route::Login, &mut session), Navigation::Proceed(Route::Login));
    }

    #[test]
    fn test_guard_clears_invalid_token() {
        let mut session = with_token("expired");
        assert_eq!(guard(Route::Logs, &mut session), Navigation::Redirect(Route::Login));
        assert_eq!(session, Session::default());

        // Visiting the login page itself leaves the token alone
        let mut session = with_token("expired");
        assert_eq!(guard(Route::Login, &mut session), Navigation::Proceed(Route::Login));
        assert_eq!(session.auth_token.as_deref(), Some("expired"));
    }

    #[test]
    fn test_store_round_trip_and_navigate() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().unwrap(), Session::default());

        store.save(&with_token("stale")).unwrap();
        let (navigation, session) = store.navigate(Route::Training).unwrap();
        assert_eq!(navigation, Navigation::Redirect(Route::Login));
        assert_eq!(session, Session::default());
        assert_eq!(store.load().unwrap(), Session::default());

        store.save(&Session::authenticated("1")).unwrap();
        let (navigation, _) = store.navigate(Route::Training).unwrap();
        assert_eq!(navigation, Navigation::Proceed(Route::Training));

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(SessionStore::new(path).load(), Err(SessionError::Json(_))));
    }
}
