use std::path::{Path, PathBuf};
use std::time::Duration;

use convergence::PollSchedule;
use serde::{Deserialize, Deserializer};

use crate::common::error::config_error;
use crate::metrics::SCALING_METRICS_NAMESPACE;

/// Overrides the tick interval of every monitoring profile.
pub const TICK_INTERVAL_ENV: &str = "CLUSTERWATCH_TICK_INTERVAL_MS";
/// Overrides the maximum monitoring time of every monitoring profile.
pub const MAX_MONITORING_TIME_ENV: &str = "CLUSTERWATCH_MAX_MONITORING_TIME_MS";

fn get_duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Value of `CLUSTERWATCH_MAX_MONITORING_TIME_MS`, if set.
pub fn max_monitoring_time_from_env() -> Option<Duration> {
    get_duration_from_env(MAX_MONITORING_TIME_ENV)
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileKind {
    /// Sample every second, used for scaling stress tests.
    Scaling,
    /// Sample every 20 seconds, used while waiting for nodes to be allocated.
    Allocation,
    /// Sample every 20 seconds, used for watching scheduler membership only.
    Watch,
}

/// How often to sample and for how long at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorProfile {
    pub tick: Duration,
    pub max_monitoring_time: Duration,
}

impl MonitorProfile {
    pub fn new(kind: ProfileKind, max_monitoring_time: Duration) -> Self {
        let tick = match kind {
            ProfileKind::Scaling => Duration::from_secs(1),
            ProfileKind::Allocation | ProfileKind::Watch => Duration::from_secs(20),
        };
        Self {
            tick,
            max_monitoring_time,
        }
    }

    pub fn with_overrides(
        mut self,
        tick: Option<Duration>,
        max_monitoring_time: Option<Duration>,
    ) -> Self {
        if let Some(tick) = tick {
            self.tick = tick;
        }
        if let Some(max_monitoring_time) = max_monitoring_time {
            self.max_monitoring_time = max_monitoring_time;
        }
        self
    }

    /// Applies overrides from `CLUSTERWATCH_TICK_INTERVAL_MS` and
    /// `CLUSTERWATCH_MAX_MONITORING_TIME_MS`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            get_duration_from_env(TICK_INTERVAL_ENV),
            max_monitoring_time_from_env(),
        )
    }

    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::new(self.tick, self.max_monitoring_time)
    }
}

fn parse_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn parse_optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    text.map(|text| humantime::parse_duration(&text).map_err(serde::de::Error::custom))
        .transpose()
}

fn default_namespace() -> String {
    SCALING_METRICS_NAMESPACE.to_string()
}

/// One step of a scaling test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingPhase {
    /// Desired number of compute nodes.
    pub target: u64,
    /// Overrides the monitoring time of the whole test.
    #[serde(default, deserialize_with = "parse_optional_duration")]
    pub max_monitoring_time: Option<Duration>,
    /// Command executed on the head node before monitoring, e.g. a job submission.
    #[serde(default)]
    pub command: Option<String>,
}

/// Scaling test description loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingTestConfig {
    #[serde(deserialize_with = "parse_duration")]
    pub max_monitoring_time: Duration,
    #[serde(default)]
    pub publish_metrics: bool,
    #[serde(default = "default_namespace")]
    pub metrics_namespace: String,
    /// Where bootstrap errors are stored when a phase does not converge.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub phases: Vec<ScalingPhase>,
}

impl ScalingTestConfig {
    pub fn parse(text: &str) -> crate::Result<Self> {
        let config: ScalingTestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.phases.is_empty() {
            return config_error("at least one scaling phase has to be defined");
        }
        if self.metrics_namespace.trim().is_empty() {
            return config_error("metrics namespace must not be empty");
        }
        if self.max_monitoring_time.is_zero() {
            return config_error("maximum monitoring time must be positive");
        }
        for (index, phase) in self.phases.iter().enumerate() {
            if phase.max_monitoring_time.is_some_and(|time| time.is_zero()) {
                return config_error(format!(
                    "maximum monitoring time of phase {index} must be positive"
                ));
            }
        }
        Ok(())
    }

    pub fn phase_monitoring_time(&self, phase: &ScalingPhase) -> Duration {
        phase.max_monitoring_time.unwrap_or(self.max_monitoring_time)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{MonitorProfile, ProfileKind, ScalingTestConfig};
    use crate::Error;

    #[test]
    fn profile_ticks() {
        let max = Duration::from_secs(600);
        assert_eq!(
            MonitorProfile::new(ProfileKind::Scaling, max).tick,
            Duration::from_secs(1)
        );
        assert_eq!(
            MonitorProfile::new(ProfileKind::Allocation, max).tick,
            Duration::from_secs(20)
        );
        let watch = MonitorProfile::new(ProfileKind::Watch, max);
        assert_eq!(watch.schedule().tick, Duration::from_secs(20));
        assert_eq!(watch.schedule().ceiling, max);
    }

    #[test]
    fn profile_overrides() {
        let profile = MonitorProfile::new(ProfileKind::Watch, Duration::from_secs(600))
            .with_overrides(Some(Duration::from_millis(50)), None);
        assert_eq!(profile.tick, Duration::from_millis(50));
        assert_eq!(profile.max_monitoring_time, Duration::from_secs(600));
    }

    #[test]
    fn parse_config() {
        let config = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "20m"
publish_metrics = true
output_dir = "out"

[[phases]]
target = 1000
command = "sbatch --wrap 'sleep 300' -N 1000"

[[phases]]
target = 0
max_monitoring_time = "5m"
"#,
        )
        .unwrap();
        assert!(config.publish_metrics);
        assert_eq!(config.metrics_namespace, "ParallelCluster/ScalingStressTest");
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.phases.len(), 2);
        assert_eq!(
            config.phase_monitoring_time(&config.phases[0]),
            Duration::from_secs(20 * 60)
        );
        assert_eq!(
            config.phase_monitoring_time(&config.phases[1]),
            Duration::from_secs(5 * 60)
        );
    }

    #[test]
    fn reject_empty_phases() {
        let result = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "20m"
phases = []
"#,
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn reject_zero_monitoring_time() {
        let result = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "0s"
[[phases]]
target = 1
"#,
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn reject_empty_namespace() {
        let result = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "1m"
metrics_namespace = " "
[[phases]]
target = 1
"#,
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn reject_invalid_duration() {
        let result = ScalingTestConfig::parse(
            r#"
max_monitoring_time = "soon"
[[phases]]
target = 1
"#,
        );
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
