use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use serde::Deserialize;

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "GANTT_";

/// What deleting a project does to the tasks it still holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete the project's tasks along with it
    #[default]
    Cascade,
    /// Refuse to delete a project that still has tasks
    Restrict,
}

/// Configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP listener binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port the HTTP listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Lifetime of a login session in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite://gantt.db".to_string()
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60 // 24 hours
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            database_url: default_database_url(),
            session_ttl_secs: default_session_ttl(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

/// Command-line overrides for the environment configuration
#[derive(Debug, Default, Parser)]
#[command(name = "website", about = "Project tracker with Gantt charts")]
pub struct Args {
    /// Address to bind, e.g. 0.0.0.0
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(long, short)]
    pub port: Option<u16>,

    /// SQLite connection URL, e.g. sqlite://gantt.db
    #[arg(long)]
    pub database_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables from a `.env` file are loaded first if it exists. Every
    /// setting is optional and falls back to its default.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::prefixed(ENV_PREFIX).from_env::<Config>()?;

        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn with_args(mut self, args: Args) -> Self {
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(database_url) = args.database_url {
            self.database_url = database_url;
        }
        self
    }

    /// `host:port` string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Load configuration from the environment and the command line
pub fn init() -> Result<Config> {
    let config = Config::load()?.with_args(Args::parse());

    Ok(config)
}
