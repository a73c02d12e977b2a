//! Server and engine configuration.
//!
//! Every server flag can also come from the environment, so containers can
//! be configured without a command line.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Tuning knobs for the phase driver
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Wall-clock time between driver ticks (default: 10s)
    pub tick_interval: Duration,
    /// Progress added per tick (default: 0.02, i.e. 50 ticks per run)
    pub progress_per_tick: f64,
    /// Chance of a random in-phase event per tick (default: 0.3)
    pub event_probability: f64,
    /// Seed for every driver's RNG; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            progress_per_tick: 0.02,
            event_probability: 0.3,
            seed: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
    Test,
}

/// Log line format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "aegis-server")]
#[command(about = "Attack-simulation training backend")]
#[command(version)]
pub struct ServerConfig {
    /// Host to bind to
    #[arg(long, env = "AEGIS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "AEGIS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Deployment environment; development seeds a demo simulation
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value = "development")]
    pub environment: Environment,

    /// tracing filter directive (overridden by RUST_LOG)
    #[arg(long, env = "AEGIS_LOG", default_value = "info")]
    pub log_filter: String,

    /// Log output format
    #[arg(long, env = "AEGIS_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Milliseconds between driver ticks
    #[arg(long, env = "AEGIS_TICK_MS", default_value_t = 10_000)]
    pub tick_ms: u64,

    /// Progress added per tick
    #[arg(long, env = "AEGIS_PROGRESS_PER_TICK", default_value_t = 0.02)]
    pub progress_per_tick: f64,

    /// Probability of a random event per tick
    #[arg(long, env = "AEGIS_EVENT_PROBABILITY", default_value_t = 0.3)]
    pub event_probability: f64,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, env = "AEGIS_SEED")]
    pub seed: Option<u64>,

    /// Directory for the sled write-through store; in-memory only when unset
    #[arg(long, env = "AEGIS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Allowed CORS origins (comma-separated); permissive when empty
    #[arg(long, env = "AEGIS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Username accepted by the mock login
    #[arg(long, env = "AEGIS_ADMIN_USER", default_value = "admin")]
    pub admin_user: String,

    /// Password accepted by the mock login
    #[arg(long, env = "AEGIS_ADMIN_PASSWORD", default_value = "admin")]
    pub admin_password: String,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            progress_per_tick: self.progress_per_tick.clamp(f64::EPSILON, 1.0),
            event_probability: self.event_probability.clamp(0.0, 1.0),
            seed: self.seed,
        }
    }

    pub fn seeds_demo_data(&self) -> bool {
        self.environment == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = ServerConfig::parse_from(["aegis-server"]);
        let engine = config.engine();
        let defaults = EngineConfig::default();
        assert_eq!(engine.tick_interval, defaults.tick_interval);
        assert_eq!(engine.progress_per_tick, defaults.progress_per_tick);
        assert_eq!(engine.event_probability, defaults.event_probability);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_json_log_format() {
        let config = ServerConfig::parse_from(["aegis-server", "--log-format", "json"]);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_engine_values_are_clamped() {
        let config = ServerConfig::parse_from([
            "aegis-server",
            "--tick-ms",
            "0",
            "--event-probability",
            "7.5",
            "--environment",
            "production",
        ]);
        let engine = config.engine();
        assert_eq!(engine.tick_interval, Duration::from_millis(1));
        assert_eq!(engine.event_probability, 1.0);
        assert!(!config.seeds_demo_data());
    }

    #[test]
    fn test_cors_origins_split_on_commas() {
        let config = ServerConfig::parse_from([
            "aegis-server",
            "--cors-origins",
            "http://localhost:4200,https://aegis.example",
        ]);
        assert_eq!(config.cors_origins.len(), 2);
    }
}
