//! Configuration types for gpugrid
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides.

use serde::{Deserialize, Serialize};

use crate::gpu::{default_gpu_catalog, GpuTypeSpec};
use crate::task::AdmissionLimits;
use crate::{GridError, GridResult};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Simulation configuration
    pub simulation: SimulationConfig,
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl GridConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GridError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GridError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> GridResult<()> {
        let sim = &self.simulation;
        if sim.num_nodes == 0 {
            return Err(GridError::Config("num_nodes must be at least 1".to_string()));
        }
        if !(sim.speed_factor > 0.0) {
            return Err(GridError::Config(format!(
                "speed_factor must be positive, got {}",
                sim.speed_factor
            )));
        }
        if sim.gpu_types.is_empty() {
            return Err(GridError::Config("gpu_types must not be empty".to_string()));
        }
        if sim.tick_millis == 0 {
            return Err(GridError::Config("tick_millis must be at least 1".to_string()));
        }
        let thermal = &sim.thermal;
        if thermal.recovery_celsius >= thermal.throttle_celsius {
            return Err(GridError::Config(format!(
                "recovery_celsius ({}) must be below throttle_celsius ({})",
                thermal.recovery_celsius, thermal.throttle_celsius
            )));
        }
        if thermal.ambient_celsius >= thermal.max_celsius {
            return Err(GridError::Config(
                "ambient_celsius must be below max_celsius".to_string(),
            ));
        }
        if !(thermal.ambient_celsius..=thermal.max_celsius).contains(&thermal.initial_celsius) {
            return Err(GridError::Config(
                "initial_celsius must lie between ambient_celsius and max_celsius".to_string(),
            ));
        }
        if !(self.scheduler.interval_secs > 0.0) {
            return Err(GridError::Config(
                "scheduler interval_secs must be positive".to_string(),
            ));
        }
        if self.scheduler.max_task_duration_secs == 0 {
            return Err(GridError::Config(
                "max_task_duration_secs must be at least 1".to_string(),
            ));
        }
        if self.scheduler.max_task_memory_gb < 1.0 {
            return Err(GridError::Config(
                "max_task_memory_gb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub address: String,
    /// Port for the REST API server
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per wall-clock second
    pub speed_factor: f64,
    /// Number of GPU nodes in the grid
    pub num_nodes: usize,
    /// RNG seed; random when absent
    pub seed: Option<u64>,
    /// Wall-clock period of the driver loop in milliseconds
    pub tick_millis: u64,
    /// Thermal model
    pub thermal: ThermalConfig,
    /// Hardware catalog nodes are drawn from
    pub gpu_types: Vec<GpuTypeSpec>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            num_nodes: 8,
            seed: None,
            tick_millis: 100,
            thermal: ThermalConfig::default(),
            gpu_types: default_gpu_catalog(),
        }
    }
}

/// Thermal model limits in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// Above this a node is forced into throttled
    pub throttle_celsius: f64,
    /// A throttled node recovers below this
    pub recovery_celsius: f64,
    /// Absolute temperature cap
    pub max_celsius: f64,
    /// Cooling floor
    pub ambient_celsius: f64,
    /// Temperature of a freshly created node
    pub initial_celsius: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            throttle_celsius: 85.0,
            recovery_celsius: 80.0,
            max_celsius: 95.0,
            ambient_celsius: 25.0,
            initial_celsius: 30.0,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Placement policy
    pub policy: PolicyKind,
    /// Simulated seconds between scheduling passes
    pub interval_secs: f64,
    /// Longest accepted task duration
    pub max_task_duration_secs: u32,
    /// Largest accepted memory requirement in GB
    pub max_task_memory_gb: f64,
    /// Number of finished tasks kept for status queries
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Scored,
            interval_secs: 5.0,
            max_task_duration_secs: 300,
            max_task_memory_gb: 40.0,
            history_limit: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn admission_limits(&self) -> AdmissionLimits {
        AdmissionLimits {
            max_duration_secs: self.max_task_duration_secs,
            max_memory_gb: self.max_task_memory_gb,
        }
    }
}

/// Placement policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// First idle node in ID order
    Fifo,
    /// Highest telemetry score
    Scored,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Fifo => write!(f, "fifo"),
            PolicyKind::Scored => write!(f, "scored"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(PolicyKind::Fifo),
            "scored" | "intelligent" => Ok(PolicyKind::Scored),
            other => Err(GridError::Config(format!("unknown policy '{}'", other))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridConfig::default();
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.simulation.num_nodes, 8);
        assert_eq!(config.simulation.thermal.throttle_celsius, 85.0);
        assert_eq!(config.scheduler.interval_secs, 5.0);
        assert_eq!(config.scheduler.policy, PolicyKind::Scored);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let toml_str = r#"
[simulation]
num_nodes = 4
speed_factor = 10.0
seed = 7

[simulation.thermal]
throttle_celsius = 90.0

[scheduler]
policy = "fifo"
interval_secs = 2.5
"#;
        let config: GridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.simulation.num_nodes, 4);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.thermal.throttle_celsius, 90.0);
        assert_eq!(config.simulation.thermal.recovery_celsius, 80.0);
        assert_eq!(config.simulation.gpu_types.len(), 3);
        assert_eq!(config.scheduler.policy, PolicyKind::Fifo);
        assert_eq!(config.scheduler.max_task_duration_secs, 300);
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn test_custom_catalog() {
        let toml_str = r#"
[[simulation.gpu_types]]
name = "H100"
memory_gb = 80.0
tflops = 989.0
power_w = 700.0
"#;
        let config: GridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.simulation.gpu_types.len(), 1);
        assert_eq!(config.simulation.gpu_types[0].name, "H100");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GridConfig::default();
        config.simulation.num_nodes = 0;
        assert!(config.validate().is_err());

        let mut config = GridConfig::default();
        config.simulation.thermal.recovery_celsius = 86.0;
        assert!(config.validate().is_err());

        let mut config = GridConfig::default();
        config.scheduler.interval_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = GridConfig::default();
        config.simulation.speed_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("FIFO".parse::<PolicyKind>().unwrap(), PolicyKind::Fifo);
        assert_eq!("intelligent".parse::<PolicyKind>().unwrap(), PolicyKind::Scored);
        assert!("random".parse::<PolicyKind>().is_err());
    }
}
