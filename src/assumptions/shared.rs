use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::{calibration::{AssumptionRecord, CandidateRecord, Calibrator}, AssumptionKey};

/// A calibrator behind a lock, for planners running on several threads that want to share what
/// was learned. Exports are snapshots taken under the lock.
#[derive(Debug, Clone)]
pub struct SharedCalibrator {
    inner: Arc<Mutex<Calibrator>>
}

impl SharedCalibrator {
    pub fn new(calibrator: Calibrator) -> SharedCalibrator {
        SharedCalibrator { inner: Arc::new(Mutex::new(calibrator)) }
    }

    pub fn calibrate(&self, key: AssumptionKey, raw_estimate: f64) -> f64 {
        self.inner.lock().calibrate(key, raw_estimate)
    }

    pub fn mark_awaiting_verification(&self, key: AssumptionKey) -> bool {
        self.inner.lock().mark_awaiting_verification(key)
    }

    pub fn drop_candidate(&self, key: AssumptionKey, observed_estimate: f64) -> bool {
        self.inner.lock().drop_candidate(key, observed_estimate)
    }

    pub fn export_all(&self) -> Vec<AssumptionRecord> {
        self.inner.lock().export_all().collect()
    }

    pub fn export_candidates(&self) -> Vec<CandidateRecord> {
        self.inner.lock().export_candidates().collect()
    }

    /// Exclusive access for callers that need several operations to happen atomically,
    /// like calibrating and marking within the same planning step.
    pub fn lock(&self) -> MutexGuard<'_, Calibrator> {
        self.inner.lock()
    }
}
