use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

/// Longest session lifetime accepted: ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Where the database and uploaded files live. Shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// SQLite database file
    #[arg(long, env = "TRELLIS_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Root directory for uploaded files (defaults to the data dir)
    #[arg(long, env = "TRELLIS_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}

impl StorageArgs {
    pub fn db_config(&self) -> trellis_db::DbConfig {
        trellis_db::DbConfig {
            sqlite_path: self
                .db_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }

    pub fn upload_root(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(trellis_db::data_dir)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "TRELLIS_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    #[arg(long, env = "TRELLIS_PORT", default_value = "3710")]
    pub port: u16,

    /// Lifetime of a sign-in session (hours)
    #[arg(
        long,
        env = "TRELLIS_SESSION_TTL_HOURS",
        default_value = "168",
        value_parser = clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_HOURS)
    )]
    pub session_ttl_hours: i64,

    /// Mark the session cookie `Secure` (serve behind TLS)
    #[arg(long, env = "TRELLIS_SECURE_COOKIES", action = clap::ArgAction::Set, default_value_t = false)]
    pub secure_cookies: bool,

    /// How often expired sessions and stuck jobs are swept (seconds)
    #[arg(long, env = "TRELLIS_SWEEP_INTERVAL", default_value = "60")]
    pub sweep_interval: u64,
}

impl ServeArgs {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            session_ttl: chrono::Duration::hours(
                self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS),
            ),
            secure_cookies: self.secure_cookies,
        }
    }
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 3710,
            session_ttl_hours: 168,
            secure_cookies: false,
            sweep_interval: 60,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    /// Jobs processed at once
    #[arg(long, env = "TRELLIS_WORKER_CONCURRENCY", default_value = "5")]
    pub concurrency: usize,

    /// Queue poll interval (milliseconds)
    #[arg(long, env = "TRELLIS_WORKER_POLL_MS", default_value = "1000")]
    pub poll_ms: u64,

    /// Attempts before a job is marked failed
    #[arg(long, env = "TRELLIS_JOB_MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: i64,
}

impl WorkerArgs {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.concurrency.max(1),
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            max_attempts: self.max_attempts.max(1),
            ..WorkerConfig::default()
        }
    }
}

/// Request-time settings handed to routes through the app state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub session_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServeArgs::default().server_config()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_attempts: i64,
    /// Base delay before a failed job is retried; grows with each attempt.
    pub retry_backoff: chrono::Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_millis(1000),
            max_attempts: 3,
            retry_backoff: chrono::Duration::seconds(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    #[test]
    fn session_ttl_is_clamped() {
        let ttl = |hours| {
            ServeArgs {
                session_ttl_hours: hours,
                ..ServeArgs::default()
            }
            .server_config()
            .session_ttl
        };
        assert_eq!(ttl(-5), chrono::Duration::hours(1));
        assert_eq!(ttl(0), chrono::Duration::hours(1));
        assert_eq!(ttl(i64::MAX), chrono::Duration::hours(MAX_SESSION_TTL_HOURS));
        assert_eq!(ServerConfig::default().session_ttl, chrono::Duration::hours(168));
    }

    #[test]
    fn out_of_range_session_ttl_is_rejected_on_the_command_line() {
        assert!(Cli::try_parse_from(["trellis", "--session-ttl-hours", "-1"]).is_err());
        assert!(Cli::try_parse_from(["trellis", "--session-ttl-hours", "0"]).is_err());
        assert!(Cli::try_parse_from(["trellis", "--session-ttl-hours", "999999999999"]).is_err());
        let cli = Cli::try_parse_from(["trellis", "--session-ttl-hours", "24"]).unwrap();
        assert_eq!(cli.serve.session_ttl_hours, 24);
    }
}
