use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_URL: &str = "https://registrar.kfupm.edu.sa/CourseOffering";
const DEFAULT_USER_AGENT: &str = "KfupmOfferings/0.1 (Course Offering Crawler)";

#[derive(Parser, Debug, Clone)]
#[command(name = "offerings")]
#[command(about = "KFUPM course offering crawler - collects courses and sections for recent terms")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Crawl every (term, department) pair and store the result
    Crawl {
        #[command(flatten)]
        config: Config,

        #[command(flatten)]
        sinks: SinkConfig,
    },
    /// Load the landing page and list the terms and departments it offers
    Inspect {
        #[command(flatten)]
        config: Config,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Course offering page URL
    #[arg(short, long, env = "OFFERINGS_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Number of most recent terms to crawl
    #[arg(short, long, env = "OFFERINGS_TERM_LIMIT", default_value = "3")]
    pub term_limit: usize,

    /// Diagnostics log file, truncated at the start of every run
    #[arg(long, env = "OFFERINGS_LOG_FILE", default_value = "logs.log")]
    pub log_file: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, env = "OFFERINGS_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// User agent sent to the portal
    #[arg(long, env = "OFFERINGS_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SinkConfig {
    /// Write the courses to this JSON file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Local SQLite database file
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Turso/LibSQL database URL (e.g., libsql://your-db.turso.io)
    /// When set, used instead of --db
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Turso/LibSQL authentication token (required when using --database-url)
    #[arg(long, env = "DATABASE_AUTH_TOKEN")]
    pub database_auth_token: Option<String>,

    /// Print a per-term summary to stdout
    #[arg(long)]
    pub print: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            bail!(
                "Invalid URL '{}': must start with http:// or https://",
                self.url
            );
        }

        if self.term_limit == 0 {
            bail!("Invalid term limit: at least one term must be crawled");
        }

        if self.timeout_secs == 0 {
            bail!("Invalid timeout: --timeout-secs must be at least 1");
        }

        Ok(())
    }
}

impl SinkConfig {
    /// Check if using Turso/remote database
    pub fn uses_turso(&self) -> bool {
        self.database_url.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ref db_url) = self.database_url {
            if !db_url.starts_with("libsql://") && !db_url.starts_with("https://") {
                bail!(
                    "Invalid database URL '{}': must start with libsql:// or https://\n\
                     Example: libsql://your-database.turso.io",
                    db_url
                );
            }

            if self.database_auth_token.is_none() {
                bail!(
                    "Turso database URL requires --database-auth-token to be set.\n\
                     Set it via CLI flag or DATABASE_AUTH_TOKEN environment variable."
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            url: DEFAULT_URL.to_string(),
            term_limit: 3,
            log_file: PathBuf::from("logs.log"),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verbose: false,
        }
    }

    fn sinks() -> SinkConfig {
        SinkConfig {
            output: None,
            db: None,
            database_url: None,
            database_auth_token: None,
            print: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
        assert_eq!(config().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = config();
        config.url = "registrar.kfupm.edu.sa".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_term_limit_and_timeout() {
        let mut c = config();
        c.term_limit = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.timeout_secs = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_turso_requires_token() {
        let mut s = sinks();
        s.database_url = Some("libsql://offerings.turso.io".to_string());
        assert!(s.validate().is_err());

        s.database_auth_token = Some("token".to_string());
        assert!(s.validate().is_ok());
        assert!(s.uses_turso());

        s.database_url = Some("postgres://localhost".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_parses_crawl_command() {
        let cli = Cli::try_parse_from([
            "offerings",
            "crawl",
            "--term-limit",
            "2",
            "--output",
            "courses.json",
            "--print",
        ])
        .unwrap();

        match cli.command {
            Command::Crawl { config, sinks } => {
                assert_eq!(config.term_limit, 2);
                assert_eq!(sinks.output, Some(PathBuf::from("courses.json")));
                assert!(sinks.print);
                assert!(sinks.db.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
