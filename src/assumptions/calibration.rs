use tracing::{debug, info};

use crate::config::{CalibrationConfig, EstimationMode};

use super::{Assumption, AssumptionKey, AssumptionStore, Candidate};

/// Record of one assumption entry as shown by the introspection views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssumptionRecord {
    pub space: i32,
    pub fingerprint: i32,
    pub awaiting_verification: bool,
    pub usage_counter: u64
}

impl From<&Assumption> for AssumptionRecord {
    fn from(value: &Assumption) -> Self {
        AssumptionRecord {
            space: value.key.space,
            fingerprint: value.key.fingerprint,
            awaiting_verification: value.awaiting_verification,
            usage_counter: value.usage_counter
        }
    }
}

/// Record of one candidate, the per raw estimate calibration track of an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRecord {
    pub space: i32,
    pub fingerprint: i32,
    pub observed_estimate: f64,
    pub calibrated_estimate: f64
}

impl CandidateRecord {
    fn new(key: AssumptionKey, candidate: &Candidate) -> Self {
        CandidateRecord {
            space: key.space,
            fingerprint: key.fingerprint,
            observed_estimate: candidate.observed_estimate,
            calibrated_estimate: candidate.calibrated_estimate
        }
    }
}

/*
    The calibrator owns the (lazily created) store and the configuration and is the only thing
    that drives the state machine. Two phases talk to it:
    - planning calls calibrate() for every relation/join estimate,
    - whoever puts a calibrated estimate into the chosen plan calls mark_awaiting_verification().
    The flag is only ever cleared by calibrate() itself.

    Not thread safe for concurrent mutation. Give every worker its own calibrator or go through
    SharedCalibrator.
 */
#[derive(Debug)]
pub struct Calibrator {
    config: CalibrationConfig,
    store: Option<AssumptionStore>
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Calibrator {
        Calibrator { config, store: None }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            info!(enabled, "assumptions switched");
        }
        self.config.enabled = enabled;
    }

    pub fn set_mode(&mut self, mode: EstimationMode) {
        if self.config.mode != mode {
            info!(from = %self.config.mode, to = %mode, "estimation mode changed");
        }
        self.config.mode = mode;
    }

    /// Whether the store has been allocated yet. It is only created on the first learned assumption.
    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    pub fn lookup(&self, key: AssumptionKey) -> Option<&Assumption> {
        self.store.as_ref()?.lookup(key)
    }

    /// Returns the row count the planner should use for the site `key` whose raw estimate is
    /// `observed_estimate`.
    ///
    /// Panics if calibration is enabled while the estimation subsystem is disabled.
    pub fn do_assumption(&mut self, key: AssumptionKey, observed_estimate: f64) -> f64 {
        if !self.config.enabled {
            return observed_estimate;
        }

        assert!(self.config.mode != EstimationMode::Disabled,
            "assumptions used while the estimation subsystem is disabled");

        let trust_factor = self.config.trust_factor();
        if let Some((calibrated, _)) = self.store.as_mut()
            .and_then(|store| store.calibrate(key, observed_estimate, trust_factor)) {
            return calibrated;
        }

        if self.config.mode == EstimationMode::Frozen {
            debug!(%key, observed_estimate, "no assumption learned, frozen mode passes through");
            return observed_estimate;
        }

        self.store.get_or_insert_with(AssumptionStore::new).insert(key, observed_estimate, trust_factor)
    }

    /// Alias of [`Calibrator::do_assumption`] under the name the optimizer hooks use.
    #[inline]
    pub fn calibrate(&mut self, key: AssumptionKey, raw_estimate: f64) -> f64 {
        self.do_assumption(key, raw_estimate)
    }

    /// Flags the entry for `key` as used in a chosen plan. Returns false if there is no such entry.
    pub fn mark_awaiting_verification(&mut self, key: AssumptionKey) -> bool {
        match self.store.as_mut().and_then(|store| store.lookup_mut(key)) {
            Some(entry) => {
                entry.awaiting_verification = true;
                true
            },
            None => false
        }
    }

    pub fn drop_candidate(&mut self, key: AssumptionKey, observed_estimate: f64) -> bool {
        self.store.as_mut()
            .map(|store| store.remove_candidate(key, observed_estimate))
            .unwrap_or(false)
    }

    /// One record per entry, in no particular order. The calibrator can't be mutated while the
    /// iterator is alive.
    pub fn export_all(&self) -> impl Iterator<Item = AssumptionRecord> + '_ {
        self.store.iter()
            .flat_map(|store| store.iter())
            .map(AssumptionRecord::from)
    }

    /// One record per candidate. Candidates of one entry come out in insertion order.
    pub fn export_candidates(&self) -> impl Iterator<Item = CandidateRecord> + '_ {
        self.store.iter()
            .flat_map(|store| store.iter())
            .flat_map(|entry| entry.candidates().iter().map(move |c| CandidateRecord::new(entry.key(), c)))
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Calibrator::new(CalibrationConfig::default())
    }
}
