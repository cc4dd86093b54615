pub mod calibration;
pub mod shared;

use std::fmt::Display;

use ahash::AHashMap;
use tracing::{debug, trace};

/*
    The assumption store keeps, per feature-space site, the calibrated row counts we handed out
    to the planner. A site is identified by the (space, fingerprint) pair computed by whoever
    fingerprints clauses and relations. We never look inside it.

    A site can be reached with different raw planner estimates (think different constants in
    the same predicate), so every entry tracks a small list of candidates, one per raw estimate.
    Candidates are matched by exact floating point equality of the raw estimate, with no
    tolerance. So 0.0 and -0.0 are the same candidate, and NaN is treated as equal to itself so a
    NaN estimate keeps reusing its candidate instead of piling up new ones.

    Nothing is ever evicted. Entries disappear only when their last candidate is dropped.
 */

/// Escalation applied to a calibration that was used in a plan but never verified.
pub const ESCALATION_FACTOR: f64 = 10.0;
pub const MINIMUM_ROW_COUNT: f64 = 1.0;
pub const MAXIMUM_ROW_COUNT: f64 = 1e100;

/// Clamp a row count into the range the planner can work with.
/// NaN and huge values saturate at the maximum, everything at or below one row becomes
/// exactly one row, the rest is rounded to a whole number of rows (ties to even).
pub fn clamp_row_estimate(rows: f64) -> f64 {
    if rows.is_nan() || rows > MAXIMUM_ROW_COUNT {
        MAXIMUM_ROW_COUNT
    } else if rows <= MINIMUM_ROW_COUNT {
        MINIMUM_ROW_COUNT
    } else {
        rows.round_ties_even()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssumptionKey {
    pub space: i32,
    pub fingerprint: i32
}

impl AssumptionKey {
    pub fn new(space: i32, fingerprint: i32) -> Self {
        Self { space, fingerprint }
    }
}

impl Display for AssumptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.space, self.fingerprint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub observed_estimate: f64,
    pub calibrated_estimate: f64
}

impl Candidate {
    fn first_seen(observed_estimate: f64, trust_factor: f64) -> Candidate {
        Candidate {
            observed_estimate,
            calibrated_estimate: clamp_row_estimate(observed_estimate * trust_factor)
        }
    }

    #[inline]
    fn observed(&self, observed_estimate: f64) -> bool {
        self.observed_estimate == observed_estimate
            || (self.observed_estimate.is_nan() && observed_estimate.is_nan())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Created,
    Reused,
    Escalated
}

#[derive(Debug, Clone)]
pub struct Assumption {
    key: AssumptionKey,
    candidates: Vec<Candidate>,
    usage_counter: u64,
    awaiting_verification: bool
}

impl Assumption {
    fn new(key: AssumptionKey) -> Assumption {
        Assumption { key, candidates: Vec::new(), usage_counter: 0, awaiting_verification: false }
    }

    pub fn key(&self) -> AssumptionKey {
        self.key
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, observed_estimate: f64) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.observed(observed_estimate))
    }

    pub fn usage_counter(&self) -> u64 {
        self.usage_counter
    }

    pub fn awaiting_verification(&self) -> bool {
        self.awaiting_verification
    }

    // The whole per-entry state machine. Returns the calibrated estimate of the candidate that
    // was selected (or created) and how we got there.
    fn calibrate(&mut self, observed_estimate: f64, trust_factor: f64) -> (f64, Transition) {
        let position = self.candidates.iter().position(|c| c.observed(observed_estimate));
        let (index, transition) = match position {
            Some(index) if self.awaiting_verification => {
                // Used in a plan, queried again and nobody confirmed it. Assume we underestimated.
                let candidate = &mut self.candidates[index];
                candidate.calibrated_estimate = clamp_row_estimate(candidate.calibrated_estimate * ESCALATION_FACTOR);
                (index, Transition::Escalated)
            },
            Some(index) => (index, Transition::Reused),
            None => {
                self.candidates.push(Candidate::first_seen(observed_estimate, trust_factor));
                (self.candidates.len() - 1, Transition::Created)
            }
        };
        self.awaiting_verification = false;
        self.usage_counter += 1;
        (self.candidates[index].calibrated_estimate, transition)
    }

    fn remove_candidate(&mut self, observed_estimate: f64) -> bool {
        match self.candidates.iter().position(|c| c.observed(observed_estimate)) {
            Some(index) => {
                // Keep insertion order for the remaining candidates
                self.candidates.remove(index);
                true
            },
            None => false
        }
    }
}

/// Exact-match map from feature-space key to assumption entry.
/// Not synchronized: see [`shared::SharedCalibrator`] for use from several threads.
#[derive(Debug, Default)]
pub struct AssumptionStore {
    entries: AHashMap<AssumptionKey, Assumption>
}

impl AssumptionStore {
    pub fn new() -> AssumptionStore {
        AssumptionStore { entries: AHashMap::with_capacity(100) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, key: AssumptionKey) -> Option<&Assumption> {
        self.entries.get(&key)
    }

    pub(crate) fn lookup_mut(&mut self, key: AssumptionKey) -> Option<&mut Assumption> {
        self.entries.get_mut(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assumption> + '_ {
        self.entries.values()
    }

    /// Creates the entry for `key` and its first candidate. The key must not be present yet.
    pub(crate) fn insert(&mut self, key: AssumptionKey, observed_estimate: f64, trust_factor: f64) -> f64 {
        assert!(key.fingerprint != 0, "assumption key {} has a zero fingerprint", key);
        let entry = self.entries.entry(key).or_insert_with(|| Assumption::new(key));
        assert!(entry.candidates.is_empty(), "assumption {} created twice", key);
        let (calibrated, _) = entry.calibrate(observed_estimate, trust_factor);
        debug!(%key, observed_estimate, calibrated, "created assumption");
        calibrated
    }

    pub(crate) fn calibrate(&mut self, key: AssumptionKey, observed_estimate: f64, trust_factor: f64) -> Option<(f64, Transition)> {
        let entry = self.entries.get_mut(&key)?;
        let (calibrated, transition) = entry.calibrate(observed_estimate, trust_factor);
        match transition {
            Transition::Escalated => debug!(%key, observed_estimate, calibrated, "escalated unverified assumption"),
            Transition::Created => debug!(%key, observed_estimate, calibrated, "added candidate"),
            Transition::Reused => trace!(%key, observed_estimate, calibrated, "reused assumption"),
        }
        Some((calibrated, transition))
    }

    pub fn remove_candidate(&mut self, key: AssumptionKey, observed_estimate: f64) -> bool {
        let entry = match self.entries.get_mut(&key) {
            Some(entry) => entry,
            None => return false
        };
        if !entry.remove_candidate(observed_estimate) {
            return false;
        }
        trace!(%key, observed_estimate, "dropped candidate");
        if entry.candidates.is_empty() {
            self.entries.remove(&key);
            debug!(%key, "dropped assumption");
        }
        true
    }
}
