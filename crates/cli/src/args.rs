use clap::{Parser, ValueEnum};
use noisia_core::config::NoisiaCfg;

/// Harmful workload generator for PostgreSQL.
#[derive(Debug, Parser)]
#[command(name = "noisia", version, long_about = None)]
pub struct Args {
    /// Postgres connection URL, must be specified explicitly
    #[arg(long, env = "NOISIA_POSTGRES_CONNINFO", default_value = "", hide_env_values = true)]
    pub conninfo: String,

    /// Seconds to wait for the initial database connection
    #[arg(long = "connect-timeout", env = "NOISIA_CONNECT_TIMEOUT", default_value_t = 3)]
    pub connect_timeout: u64,

    /// Run workload with specified number of workers
    #[arg(long, env = "NOISIA_JOBS", default_value_t = 1)]
    pub jobs: u16,

    /// Run idle transactions workload
    #[arg(long = "idle-xacts", env = "NOISIA_IDLE_XACTS")]
    pub idle_xacts: bool,

    /// Min transactions naptime, in seconds
    #[arg(long = "idle-xacts.naptime-min", env = "NOISIA_IDLE_XACTS_NAPTIME_MIN", default_value_t = 5)]
    pub idle_xacts_naptime_min: u64,

    /// Max transactions naptime, in seconds
    #[arg(long = "idle-xacts.naptime-max", env = "NOISIA_IDLE_XACTS_NAPTIME_MAX", default_value_t = 20)]
    pub idle_xacts_naptime_max: u64,

    /// Run rollbacks workload
    #[arg(long, env = "NOISIA_ROLLBACKS")]
    pub rollbacks: bool,

    /// Number of transactions per second (per worker)
    #[arg(long = "rollbacks.rate", env = "NOISIA_ROLLBACKS_RATE", default_value_t = 10)]
    pub rollbacks_rate: u32,

    /// Seconds to wait for the workload to wind down after a signal
    #[arg(long = "drain-timeout", env = "NOISIA_DRAIN_TIMEOUT", default_value_t = 0)]
    pub drain_timeout: u64,

    /// Exit with status 1 when a workload error ends the run
    #[arg(long = "fail-on-workload-error", env = "NOISIA_FAIL_ON_WORKLOAD_ERROR")]
    pub fail_on_workload_error: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long = "log-level", env = "NOISIA_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long = "log-format", env = "NOISIA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    pub fn to_cfg(&self) -> NoisiaCfg {
        NoisiaCfg {
            conninfo: self.conninfo.clone(),
            connect_timeout_secs: self.connect_timeout,
            jobs: self.jobs,
            idle_xacts: self.idle_xacts,
            idle_xacts_naptime_min: self.idle_xacts_naptime_min,
            idle_xacts_naptime_max: self.idle_xacts_naptime_max,
            rollbacks: self.rollbacks,
            rollbacks_rate: self.rollbacks_rate,
            drain_timeout_secs: self.drain_timeout,
            fail_on_workload_error: self.fail_on_workload_error,
        }
    }
}
