use serde::{Deserialize, Serialize};

/// All noisia run parameters. Assembled from flags/env by the binary and
/// frozen behind an `Arc` once [`NoisiaCfg::validate`] passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoisiaCfg {
    // target database
    pub conninfo: String,
    pub connect_timeout_secs: u64,

    // workers per enabled workload
    pub jobs: u16,

    // idle transactions
    pub idle_xacts: bool,
    pub idle_xacts_naptime_min: u64,
    pub idle_xacts_naptime_max: u64,

    // rollbacks
    pub rollbacks: bool,
    pub rollbacks_rate: u32,

    // shutdown
    pub drain_timeout_secs: u64,
    pub fail_on_workload_error: bool,
}

impl Default for NoisiaCfg {
    fn default() -> Self {
        Self {
            conninfo: String::new(),
            connect_timeout_secs: 3,
            jobs: 1,
            idle_xacts: false,
            idle_xacts_naptime_min: 5,
            idle_xacts_naptime_max: 20,
            rollbacks: false,
            rollbacks_rate: 10,
            drain_timeout_secs: 0,
            fail_on_workload_error: false,
        }
    }
}

/// A configuration rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("conninfo must be specified")]
    MissingConninfo,
    #[error("jobs must be >= 1")]
    NoJobs,
    #[error("at least one workload must be enabled")]
    NoWorkloads,
    #[error("idle-xacts.naptime-min must be >= 1")]
    NaptimeMinTooLow,
    #[error("idle-xacts.naptime-max must be >= idle-xacts.naptime-min")]
    NaptimeRangeInverted,
    #[error("rollbacks.rate must be >= 1")]
    RollbacksRateTooLow,
    #[error("connect-timeout must be >= 1")]
    ConnectTimeoutTooLow,
}

impl NoisiaCfg {
    /// Check the configuration, reporting the first rule it breaks.
    /// Workload parameters are only checked for enabled workloads.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.conninfo.trim().is_empty() {
            return Err(ValidationError::MissingConninfo);
        }
        if self.jobs < 1 {
            return Err(ValidationError::NoJobs);
        }
        if !self.idle_xacts && !self.rollbacks {
            return Err(ValidationError::NoWorkloads);
        }
        if self.idle_xacts {
            if self.idle_xacts_naptime_min < 1 {
                return Err(ValidationError::NaptimeMinTooLow);
            }
            if self.idle_xacts_naptime_max < self.idle_xacts_naptime_min {
                return Err(ValidationError::NaptimeRangeInverted);
            }
        }
        if self.rollbacks && self.rollbacks_rate < 1 {
            return Err(ValidationError::RollbacksRateTooLow);
        }
        if self.connect_timeout_secs < 1 {
            return Err(ValidationError::ConnectTimeoutTooLow);
        }
        Ok(())
    }

    /// Total database connections the enabled workloads may hold at once.
    pub fn max_connections(&self) -> u32 {
        let enabled = u32::from(self.idle_xacts) + u32::from(self.rollbacks);
        (u32::from(self.jobs) * enabled).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NoisiaCfg {
        NoisiaCfg {
            conninfo: "host=127.0.0.1 user=postgres".into(),
            idle_xacts: true,
            ..NoisiaCfg::default()
        }
    }

    #[test]
    fn default_is_rejected_without_conninfo() {
        assert_eq!(
            NoisiaCfg::default().validate(),
            Err(ValidationError::MissingConninfo)
        );
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn zero_jobs_rejected() {
        let cfg = NoisiaCfg { jobs: 0, ..valid() };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err, ValidationError::NoJobs);
        assert_eq!(err.to_string(), "jobs must be >= 1");
    }

    #[test]
    fn no_workload_rejected() {
        let cfg = NoisiaCfg { idle_xacts: false, ..valid() };
        assert_eq!(cfg.validate(), Err(ValidationError::NoWorkloads));
    }

    #[test]
    fn naptime_rules_only_apply_when_enabled() {
        let cfg = NoisiaCfg {
            idle_xacts_naptime_min: 10,
            idle_xacts_naptime_max: 5,
            ..valid()
        };
        assert_eq!(cfg.validate(), Err(ValidationError::NaptimeRangeInverted));

        let cfg = NoisiaCfg { idle_xacts: false, rollbacks: true, ..cfg };
        assert_eq!(cfg.validate(), Ok(()));

        let cfg = NoisiaCfg { idle_xacts_naptime_min: 0, ..valid() };
        assert_eq!(cfg.validate(), Err(ValidationError::NaptimeMinTooLow));
    }

    #[test]
    fn rollbacks_rate_checked() {
        let cfg = NoisiaCfg {
            idle_xacts: false,
            rollbacks: true,
            rollbacks_rate: 0,
            ..valid()
        };
        assert_eq!(cfg.validate(), Err(ValidationError::RollbacksRateTooLow));
    }

    #[test]
    fn first_failing_rule_wins() {
        let cfg = NoisiaCfg { conninfo: " ".into(), jobs: 0, ..valid() };
        assert_eq!(cfg.validate(), Err(ValidationError::MissingConninfo));
    }

    #[test]
    fn connect_timeout_checked() {
        let cfg = NoisiaCfg { connect_timeout_secs: 0, ..valid() };
        assert_eq!(cfg.validate(), Err(ValidationError::ConnectTimeoutTooLow));
    }

    #[test]
    fn max_connections_scales_with_jobs_and_workloads() {
        let cfg = NoisiaCfg { jobs: 4, rollbacks: true, ..valid() };
        assert_eq!(cfg.max_connections(), 8);
        assert_eq!(NoisiaCfg { jobs: 3, ..valid() }.max_connections(), 3);
    }
}
