//! Schedulers which control how a calibration study behaves from one trial to the next.
use anyhow::{Result, ensure};
use serde::Deserialize;

/// Determines the learning rate applied to constant updates in each trial
pub trait LearningRateScheduler {
    /// The learning rate for the `n`th update of the constants (1-based).
    ///
    /// The update made after the first trial is `n = 1`.
    fn learning_rate(&self, n: u32) -> f64;
}

/// Determines whether a trial continues from the output plans of the previous run
pub trait ChainScheduler {
    /// Whether the next run should be chained, given the number of completed runs
    fn chain(&self, completed: u32) -> bool;
}

/// A learning rate which increases linearly from `start` to `end` over the first `interval` updates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearLrScheduler {
    start: f64,
    end: f64,
    interval: u32,
}

impl LinearLrScheduler {
    /// Create a new scheduler.
    ///
    /// The interval must be at least 2.
    pub fn new(start: f64, end: f64, interval: u32) -> Result<Self> {
        ensure!(interval >= 2, "Learning rate interval must be at least 2");
        ensure!(
            start.is_finite() && end.is_finite(),
            "Learning rates must be finite numbers"
        );

        Ok(Self {
            start,
            end,
            interval,
        })
    }
}

impl LearningRateScheduler for LinearLrScheduler {
    fn learning_rate(&self, n: u32) -> f64 {
        if n > self.interval {
            return self.end;
        }

        let step = (self.end - self.start) / f64::from(self.interval);
        self.start + f64::from(n.saturating_sub(1)) * step
    }
}

/// A fixed learning rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantLrScheduler(pub f64);

impl LearningRateScheduler for ConstantLrScheduler {
    fn learning_rate(&self, _n: u32) -> f64 {
        self.0
    }
}

/// Chains runs often at first and less frequently as the study progresses
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultChainScheduler;

impl ChainScheduler for DefaultChainScheduler {
    fn chain(&self, completed: u32) -> bool {
        match completed {
            0 => false,
            1..=6 => completed % 2 == 0,
            7..=15 => completed % 5 == 0,
            16..=50 => completed % 10 == 0,
            _ => false,
        }
    }
}

/// Never chains runs, so every run starts from the configured plans
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeverChain;

impl ChainScheduler for NeverChain {
    fn chain(&self, _completed: u32) -> bool {
        false
    }
}

fn default_lr_end() -> f64 {
    1.0
}

/// Learning rate configuration, as read from a study file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum LearningRateConfig {
    /// See [`LinearLrScheduler`]
    Linear {
        /// The learning rate of the first update
        start: f64,
        /// The learning rate once the interval is over
        #[serde(default = "default_lr_end")]
        end: f64,
        /// The number of updates over which the rate changes
        interval: u32,
    },
    /// See [`ConstantLrScheduler`]
    Constant {
        /// The learning rate
        rate: f64,
    },
}

impl Default for LearningRateConfig {
    fn default() -> Self {
        Self::Linear {
            start: 0.3,
            end: default_lr_end(),
            interval: 8,
        }
    }
}

impl LearningRateConfig {
    /// Create the scheduler described by this configuration
    pub fn build(&self) -> Result<Box<dyn LearningRateScheduler>> {
        let scheduler: Box<dyn LearningRateScheduler> = match *self {
            Self::Linear {
                start,
                end,
                interval,
            } => Box::new(LinearLrScheduler::new(start, end, interval)?),
            Self::Constant { rate } => {
                ensure!(
                    rate.is_finite() && rate > 0.0,
                    "Learning rate must be a finite number greater than zero"
                );
                Box::new(ConstantLrScheduler(rate))
            }
        };

        Ok(scheduler)
    }
}

/// Run chaining configuration, as read from a study file
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ChainConfig {
    /// See [`DefaultChainScheduler`]
    #[default]
    Default,
    /// See [`NeverChain`]
    Never,
}

impl ChainConfig {
    /// Create the scheduler described by this configuration
    pub fn build(self) -> Box<dyn ChainScheduler> {
        match self {
            Self::Default => Box::new(DefaultChainScheduler),
            Self::Never => Box::new(NeverChain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1, 0.3)]
    #[case(2, 0.3 + 0.7 / 8.0)]
    #[case(8, 0.3 + 7.0 * 0.7 / 8.0)]
    #[case(9, 1.0)]
    #[case(100, 1.0)]
    fn test_linear_lr_scheduler(#[case] n: u32, #[case] expected: f64) {
        let scheduler = LinearLrScheduler::new(0.3, 1.0, 8).unwrap();
        assert_approx_eq!(f64, scheduler.learning_rate(n), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_lr_scheduler_interval_too_small() {
        assert_error!(
            LinearLrScheduler::new(0.3, 1.0, 1),
            "Learning rate interval must be at least 2"
        );
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, false)]
    #[case(2, true)]
    #[case(6, true)]
    #[case(7, false)]
    #[case(10, true)]
    #[case(12, false)]
    #[case(15, true)]
    #[case(20, true)]
    #[case(25, false)]
    #[case(50, true)]
    #[case(60, false)]
    fn test_default_chain_scheduler(#[case] completed: u32, #[case] expected: bool) {
        assert_eq!(DefaultChainScheduler.chain(completed), expected);
    }

    #[test]
    fn test_never_chain() {
        assert!((0..100).all(|n| !NeverChain.chain(n)));
    }

    #[test]
    fn test_learning_rate_config_default() {
        let scheduler = LearningRateConfig::default().build().unwrap();
        assert_approx_eq!(f64, scheduler.learning_rate(1), 0.3);
        assert_approx_eq!(f64, scheduler.learning_rate(9), 1.0);
    }

    #[test]
    fn test_learning_rate_config_from_toml() {
        let config: LearningRateConfig =
            toml::from_str("type = \"constant\"\nrate = 0.5").unwrap();
        assert_eq!(config, LearningRateConfig::Constant { rate: 0.5 });
        assert!(config.build().is_ok());

        let config: LearningRateConfig =
            toml::from_str("type = \"constant\"\nrate = 0.0").unwrap();
        assert!(config.build().is_err());
    }
}
