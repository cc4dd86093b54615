use std::{fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_TRUST_FACTOR: f64 = 1.2;

/*
    Operating posture of the estimation subsystem the calibrator lives in.
    Disabled means the whole subsystem is off, nobody is supposed to call into the
    calibrator at all. Learning creates new assumptions on a miss, Frozen only serves
    assumptions that were learned before and never allocates new ones.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimationMode {
    Disabled,
    Learning,
    Frozen
}

impl Display for EstimationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimationMode::Disabled => write!(f, "disabled"),
            EstimationMode::Learning => write!(f, "learning"),
            EstimationMode::Frozen => write!(f, "frozen"),
        }
    }
}

impl FromStr for EstimationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(EstimationMode::Disabled),
            "learning" | "learn" => Ok(EstimationMode::Learning),
            "frozen" => Ok(EstimationMode::Frozen),
            _ => Err(ConfigError::UnknownMode(s.to_string()))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown estimation mode '{0}', expected 'disabled', 'learning' or 'frozen'")]
    UnknownMode(String),
    #[error("trust factor must be a finite number greater than zero, got {0}")]
    InvalidTrustFactor(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    pub enabled: bool,
    pub mode: EstimationMode,
    trust_factor: f64
}

impl CalibrationConfig {
    pub fn new() -> CalibrationConfig {
        // Read environment variables 'OXID_ASSUMPTIONS', 'OXID_ESTIMATION_MODE' and 'OXID_TRUST_FACTOR'
        // Anything missing or malformed falls back to the defaults
        let enabled = match std::env::var("OXID_ASSUMPTIONS") {
            Ok(val) => parse_flag(&val).unwrap_or_else(|| {
                warn!(value = %val, "ignoring malformed OXID_ASSUMPTIONS");
                false
            }),
            Err(_) => false
        };
        let mode = match std::env::var("OXID_ESTIMATION_MODE") {
            Ok(val) => val.parse().unwrap_or_else(|e: ConfigError| {
                warn!("ignoring OXID_ESTIMATION_MODE: {}", e);
                EstimationMode::Learning
            }),
            Err(_) => EstimationMode::Learning
        };
        let trust_factor = match std::env::var("OXID_TRUST_FACTOR") {
            Ok(val) => val.trim().parse::<f64>().ok()
                .filter(|f| is_valid_trust_factor(*f))
                .unwrap_or_else(|| {
                    warn!(value = %val, "ignoring malformed OXID_TRUST_FACTOR");
                    DEFAULT_TRUST_FACTOR
                }),
            Err(_) => DEFAULT_TRUST_FACTOR
        };
        CalibrationConfig {
            enabled,
            mode,
            trust_factor
        }
    }

    pub fn learning() -> CalibrationConfig {
        CalibrationConfig { enabled: true, mode: EstimationMode::Learning, trust_factor: DEFAULT_TRUST_FACTOR }
    }

    pub fn with_mode(self, mode: EstimationMode) -> CalibrationConfig {
        CalibrationConfig { mode, ..self }
    }

    pub fn with_enabled(self, enabled: bool) -> CalibrationConfig {
        CalibrationConfig { enabled, ..self }
    }

    pub fn with_trust_factor(self, trust_factor: f64) -> Result<CalibrationConfig, ConfigError> {
        if !is_valid_trust_factor(trust_factor) {
            return Err(ConfigError::InvalidTrustFactor(trust_factor));
        }
        Ok(CalibrationConfig { trust_factor, ..self })
    }

    pub fn trust_factor(&self) -> f64 {
        self.trust_factor
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig { enabled: false, mode: EstimationMode::Learning, trust_factor: DEFAULT_TRUST_FACTOR }
    }
}

fn is_valid_trust_factor(trust_factor: f64) -> bool {
    trust_factor.is_finite() && trust_factor > 0.0
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None
    }
}
