// Runtime configuration
//
// Built once at startup and passed by reference. Graph store credentials
// come from the environment; a missing variable is fatal.

use crate::error::ConfigError;

pub const HOST_VAR: &str = "NEO4J_SERVER_NAME";
pub const PORT_VAR: &str = "NEO4J_SERVER_PORT";
pub const USERNAME_VAR: &str = "NEO4J_DB_USERNAME";
pub const PASSWORD_VAR: &str = "NEO4J_DB_PASSWORD";
pub const DATABASE_VAR: &str = "NEO4J_DATABASE";

pub const DEFAULT_DATABASE: &str = "neo4j";

/// Upper bound on writes buffered in one graph transaction
pub const MAX_WRITES_PER_TX: usize = 45_000;

#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl GraphConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::Missing(var));

        let host = required(HOST_VAR)?;
        let port_raw = required(PORT_VAR)?;
        let port = port_raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            var: PORT_VAR,
            value: port_raw.clone(),
        })?;

        Ok(GraphConfig {
            host,
            port,
            username: required(USERNAME_VAR)?,
            password: required(PASSWORD_VAR)?,
            database: lookup(DATABASE_VAR).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }

    /// `http://host:port`, keeping an explicit scheme on the host
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}
