pub mod assumptions;
pub mod catalog;
pub mod config;
pub mod console;
pub mod hooks;
pub mod types;

pub use assumptions::{calibration::Calibrator, shared::SharedCalibrator, AssumptionKey};
pub use config::{CalibrationConfig, EstimationMode};
