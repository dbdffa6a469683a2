//! Process configuration.
//!
//! Every option can be given on the command line or through the environment.
//! The environment variable names match the `.env` files of existing
//! deployments, and such a file is loaded with [`load_env_file`] before the
//! command line is parsed.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Args, Parser};

use crate::protocol::DEFAULT_MAX_FRAME_LENGTH;

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "vmregistry", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 8888)]
    pub port: u16,

    /// Longest accepted request line in bytes
    #[arg(long, env = "VMREG_MAX_FRAME_LENGTH", default_value_t = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,

    #[command(flatten)]
    pub database: DatabaseConfig,
}

impl Config {
    /// `host:port` to bind the listener to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads variables from a dotenv file into the process environment.
///
/// With no `path`, looks for `.env` in the working directory and then in
/// each parent directory. Variables already set in the environment are left
/// alone. Returns the file that was loaded, or `None` if there was none.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// PostgreSQL connection parameters.
#[derive(Clone, Args)]
pub struct DatabaseConfig {
    #[arg(id = "db_host", long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(id = "db_port", long = "db-port", env = "DB_PORT", default_value_t = 5432)]
    pub port: u16,

    #[arg(long = "db-name", env = "POSTGRES_DB", default_value = "postgres")]
    pub name: String,

    #[arg(long = "db-user", env = "POSTGRES_USER", default_value = "postgres")]
    pub user: String,

    #[arg(
        long = "db-password",
        env = "POSTGRES_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,
}

impl DatabaseConfig {
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.name)
            .user(&self.user)
            .application_name("vmregistry");
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
