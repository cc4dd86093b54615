use crate::{assumptions::calibration::{AssumptionRecord, Calibrator, CandidateRecord}, types::{Tuple, TupleValue, TupleValueType}};

/*
    Catalog-like views over the calibrator, meant for diagnostic display. The views are computed on
    request from the live store, nothing here is materialized or kept up to date.

    Here's how to add an attribute to one of the views:
    1. Add the field to the record (AssumptionRecord / CandidateRecord)
    2. Add the attribute to the corresponding *_ATTRIBUTES description
    3. IMPORTANT! (This is the only step where compilation won't fail if you forget it):
       Add the value to the From impl mapping the record to a tuple
 */

pub const ASSUMPTIONS_VIEW: &str = "assumptions";
pub const ASSUMPTION_CANDIDATES_VIEW: &str = "assumption_candidates";

pub const ASSUMPTIONS_ATTRIBUTES: [(&str, TupleValueType); 4] = [
    ("space", TupleValueType::Int),
    ("fingerprint", TupleValueType::Int),
    ("awaiting_verification", TupleValueType::Bool),
    ("usage_counter", TupleValueType::BigInt),
];

pub const ASSUMPTION_CANDIDATES_ATTRIBUTES: [(&str, TupleValueType); 4] = [
    ("space", TupleValueType::Int),
    ("fingerprint", TupleValueType::Int),
    ("observed_estimate", TupleValueType::Double),
    ("calibrated_estimate", TupleValueType::Double),
];

impl From<&AssumptionRecord> for Tuple {
    fn from(value: &AssumptionRecord) -> Self {
        Tuple::new(vec![
            Some(TupleValue::Int(value.space)), // space
            Some(TupleValue::Int(value.fingerprint)), // fingerprint
            Some(TupleValue::Bool(value.awaiting_verification)), // awaiting_verification
            // BIGINT is signed, saturate instead of wrapping
            Some(TupleValue::BigInt(i64::try_from(value.usage_counter).unwrap_or(i64::MAX))), // usage_counter
        ])
    }
}

impl From<&CandidateRecord> for Tuple {
    fn from(value: &CandidateRecord) -> Self {
        Tuple::new(vec![
            Some(TupleValue::Int(value.space)), // space
            Some(TupleValue::Int(value.fingerprint)), // fingerprint
            Some(TupleValue::Double(value.observed_estimate)), // observed_estimate
            Some(TupleValue::Double(value.calibrated_estimate)), // calibrated_estimate
        ])
    }
}

pub fn attribute_types(attributes: &[(&str, TupleValueType)]) -> Vec<TupleValueType> {
    attributes.iter().map(|(_, t)| *t).collect()
}

/// Rows of the `assumptions` view, one per entry, ordered by key so the output is stable.
pub fn store_assumptions(calibrator: &Calibrator) -> Vec<Tuple> {
    let mut records: Vec<AssumptionRecord> = calibrator.export_all().collect();
    records.sort_by_key(|r| (r.space, r.fingerprint));
    records.iter().map(Tuple::from).collect()
}

/// Rows of the `assumption_candidates` view, one per candidate. Entries are ordered by key,
/// candidates within an entry keep their insertion order.
pub fn store_assumption_candidates(calibrator: &Calibrator) -> Vec<Tuple> {
    let mut records: Vec<CandidateRecord> = calibrator.export_candidates().collect();
    // Stable sort, so insertion order survives within an entry
    records.sort_by_key(|r| (r.space, r.fingerprint));
    records.iter().map(Tuple::from).collect()
}
