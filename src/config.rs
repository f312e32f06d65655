use crate::error::{PipelineError, Result};

/// Tuning knobs shared by every stage kind.
///
/// All capacities are positive; a `rate_limit` of 0 disables throttling for
/// the stage (every acquisition is granted immediately).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the stage's internal job queue
    pub max_jobs: usize,
    /// Number of concurrent workers in the stage's pool
    pub max_workers: usize,
    /// Aggregate operations per second across the whole pool; 0 = unthrottled
    pub rate_limit: u32,
    /// Capacity of the queue the stage writes to
    pub output_buffer: usize,
}

impl Config {
    /// Create a configuration with every field set explicitly
    pub fn new(max_jobs: usize, max_workers: usize, rate_limit: u32, output_buffer: usize) -> Self {
        Self {
            max_jobs,
            max_workers,
            rate_limit,
            output_buffer,
        }
    }

    /// Check that every capacity is at least 1
    ///
    /// Stage constructors call this, so a misconfigured stage fails at build
    /// time rather than deadlocking at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.max_jobs == 0 {
            return Err(PipelineError::Config("max_jobs must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(PipelineError::Config(
                "max_workers must be at least 1".into(),
            ));
        }
        if self.output_buffer == 0 {
            return Err(PipelineError::Config(
                "output_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_jobs: 32,
            max_workers: 4,
            rate_limit: 0,
            output_buffer: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.max_jobs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.max_workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.output_buffer = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_rate_limit_allowed() {
        let cfg = Config::new(10, 3, 0, 5);
        assert!(cfg.validate().is_ok());
    }
}
