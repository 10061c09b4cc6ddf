//! Assembles connection data for an already-running database session.
//!
//! The session id and an initial query come from an ephemeral JSON file
//! (`{"session": "...", "query": "..."}`); where the server lives comes from
//! environment variables whose names are themselves configurable.

use crate::{env::EnvManager, error::ConfigError};
use model::execution::connection::ConnectionDescriptor;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Names of the environment variables holding connection data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarNames {
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for EnvVarNames {
    fn default() -> Self {
        Self {
            protocol: "SQLGRID_PROTOCOL".into(),
            host: "SQLGRID_HOST".into(),
            port: "SQLGRID_PORT".into(),
            database: "SQLGRID_DATABASE".into(),
            user: "SQLGRID_USER".into(),
            password: "SQLGRID_PASSWORD".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionData {
    pub session: String,
    pub connection: ConnectionDescriptor,
    pub environment: EnvVarNames,
    pub query: String,
}

impl SessionData {
    pub fn session_id(&self) -> Option<&str> {
        (!self.session.is_empty()).then_some(self.session.as_str())
    }

    /// Connection data, or `None` when no server location is known.
    pub fn descriptor(&self) -> Option<&ConnectionDescriptor> {
        (!self.connection.is_empty()).then_some(&self.connection)
    }

    /// Copy safe to print: password and session id are masked.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                "********".to_string()
            }
        };
        let mut copy = self.clone();
        copy.connection.password = mask(&copy.connection.password);
        copy.session = mask(&copy.session);
        copy
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionFile {
    #[serde(default)]
    session: String,
    #[serde(default)]
    query: String,
}

pub trait SessionManager: Send + Sync {
    fn get_session(&self) -> Result<SessionData, ConfigError>;
}

/// Knows of no session; yields empty data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySessionManager;

impl SessionManager for EmptySessionManager {
    fn get_session(&self) -> Result<SessionData, ConfigError> {
        Ok(SessionData::default())
    }
}

/// Session id from a file, server location from environment variables.
#[derive(Debug, Clone)]
pub struct FileSessionManager {
    session_file: Option<PathBuf>,
    names: EnvVarNames,
    env: EnvManager,
}

impl FileSessionManager {
    pub fn new(session_file: Option<PathBuf>, env: EnvManager) -> Self {
        Self {
            session_file,
            names: EnvVarNames::default(),
            env,
        }
    }

    pub fn with_names(mut self, names: EnvVarNames) -> Self {
        self.names = names;
        self
    }

    fn read_session_file(path: &Path) -> Result<SessionFile, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No session file");
                Ok(SessionFile::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn connection(&self) -> Result<ConnectionDescriptor, ConfigError> {
        let port = match self.env.get(&self.names.port).map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| ConfigError::InvalidEnv {
                var: self.names.port.clone(),
                value: raw.to_string(),
            })?),
        };

        Ok(ConnectionDescriptor {
            protocol: self.env.get_or_empty(&self.names.protocol),
            host: self.env.get_or_empty(&self.names.host),
            port,
            database: self.env.get_or_empty(&self.names.database),
            user: self.env.get_or_empty(&self.names.user),
            password: self.env.get_or_empty(&self.names.password),
        })
    }
}

impl SessionManager for FileSessionManager {
    fn get_session(&self) -> Result<SessionData, ConfigError> {
        let file = match &self.session_file {
            Some(path) => Self::read_session_file(path)?,
            None => SessionFile::default(),
        };

        let data = SessionData {
            session: file.session,
            connection: self.connection()?,
            environment: self.names.clone(),
            query: file.query,
        };

        info!(
            connection = %data.connection,
            has_session = !data.session.is_empty(),
            "Resolved session data"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env() -> EnvManager {
        EnvManager::from_vars([
            ("SQLGRID_PROTOCOL", "postgres"),
            ("SQLGRID_HOST", "db.local"),
            ("SQLGRID_PORT", "6274"),
            ("SQLGRID_PASSWORD", "pw"),
        ])
    }

    #[test]
    fn test_empty_manager() {
        let data = EmptySessionManager.get_session().unwrap();
        assert_eq!(data, SessionData::default());
        assert!(data.descriptor().is_none());
        assert!(data.session_id().is_none());
    }

    #[test]
    fn test_file_and_env_are_combined() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"session": "abc123", "query": "SELECT 1"}}"#).unwrap();

        let manager = FileSessionManager::new(Some(file.path().to_path_buf()), env());
        let data = manager.get_session().unwrap();
        assert_eq!(data.session_id(), Some("abc123"));
        assert_eq!(data.query, "SELECT 1");
        assert_eq!(data.connection.host, "db.local");
        assert_eq!(data.connection.port, Some(6274));
        assert_eq!(data.connection.protocol, "postgres");
    }

    #[test]
    fn test_missing_session_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FileSessionManager::new(Some(dir.path().join("nope.json")), env());
        let data = manager.get_session().unwrap();
        assert!(data.session.is_empty());
        assert!(data.descriptor().is_some());
    }

    #[test]
    fn test_malformed_session_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{").unwrap();
        let manager = FileSessionManager::new(Some(file.path().to_path_buf()), env());
        assert!(matches!(
            manager.get_session(),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_custom_names_and_bad_port() {
        let env = EnvManager::from_vars([("DB_PORT", "not-a-port")]);
        let names = EnvVarNames {
            port: "DB_PORT".into(),
            ..Default::default()
        };
        let manager = FileSessionManager::new(None, env).with_names(names);
        assert!(matches!(
            manager.get_session(),
            Err(ConfigError::InvalidEnv { var, .. }) if var == "DB_PORT"
        ));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let manager = FileSessionManager::new(None, env());
        let mut data = manager.get_session().unwrap();
        data.session = "abc".into();
        let redacted = data.redacted();
        assert_eq!(redacted.connection.password, "********");
        assert_eq!(redacted.session, "********");
        assert_eq!(redacted.connection.host, "db.local");
    }
}
