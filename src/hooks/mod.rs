/*
    Glue between the planner's row estimation and the calibrator.

    For every base relation or join the planner wants a row count for, somebody has already
    fingerprinted the clauses into an AssumptionKey. A predictor (some learned model) gets the first
    shot. It may refuse, in which case the planner's own default estimate is used, routed through
    the calibrator so repeated refusals on the same site get corrected over time.

    A query can also only learn: the predictor still sees every site (so it can record what it
    was asked) but the planner gets its default estimates and the calibrator is left alone.

    After plan selection, the keys whose estimates made it into the chosen plan are reported back
    with plan_chosen() so the calibrator knows those assumptions are now unverified.
 */

use tracing::trace;

use crate::assumptions::{calibration::Calibrator, AssumptionKey};

#[cfg_attr(test, mockall::automock)]
pub trait RowPredictor {
    /// None means the predictor refuses to estimate this site.
    fn predict(&self, key: AssumptionKey) -> Option<f64>;
}

#[cfg_attr(test, mockall::automock)]
pub trait DefaultEstimator {
    fn estimate_rows(&self, key: AssumptionKey) -> f64;
}

/// Per query switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryContext {
    /// Serve predicted or calibrated row counts to the planner.
    pub use_calibration: bool,
    /// Consult the predictor even when its answers are not served.
    pub learn: bool
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowEstimate {
    pub rows: f64,
    /// What the predictor said, if it said anything.
    pub predicted: Option<f64>,
    /// Set when the rows came out of the calibrator, so the caller knows which key to report
    /// in plan_chosen().
    pub assumption: Option<AssumptionKey>
}

pub struct CardinalityHooks<P: RowPredictor, D: DefaultEstimator> {
    predictor: P,
    default_estimator: D
}

impl<P: RowPredictor, D: DefaultEstimator> CardinalityHooks<P, D> {
    pub fn new(predictor: P, default_estimator: D) -> Self {
        Self { predictor, default_estimator }
    }

    pub fn relation_rows(&self, context: &QueryContext, calibrator: &mut Calibrator, key: AssumptionKey) -> RowEstimate {
        if !context.use_calibration && !context.learn {
            return RowEstimate { rows: self.default_estimator.estimate_rows(key), predicted: None, assumption: None };
        }

        let predicted = self.predictor.predict(key).filter(|p| *p >= 0.0);
        if !context.use_calibration {
            trace!(%key, ?predicted, "learning only, serving the default estimate");
            return RowEstimate { rows: self.default_estimator.estimate_rows(key), predicted, assumption: None };
        }

        if let Some(predicted) = predicted {
            return RowEstimate { rows: predicted, predicted: Some(predicted), assumption: None };
        }

        let raw_estimate = self.default_estimator.estimate_rows(key);
        let rows = calibrator.calibrate(key, raw_estimate);
        trace!(%key, raw_estimate, rows, "predictor refused, using assumption");
        RowEstimate {
            rows,
            predicted: None,
            assumption: calibrator.lookup(key).map(|_| key)
        }
    }

    /// Reports the assumptions that ended up in the chosen plan. Returns how many were flagged.
    pub fn plan_chosen(&self, context: &QueryContext, calibrator: &mut Calibrator, keys: impl IntoIterator<Item = AssumptionKey>) -> usize {
        if !context.use_calibration {
            return 0;
        }
        keys.into_iter()
            .filter(|key| calibrator.mark_awaiting_verification(*key))
            .count()
    }
}

#[cfg(test)]
mod test {
    use mockall::predicate::eq;

    use crate::config::{CalibrationConfig, EstimationMode};

    use super::*;

    const KEY: AssumptionKey = AssumptionKey { space: 1, fingerprint: 77 };
    const USE: QueryContext = QueryContext { use_calibration: true, learn: false };
    const LEARN: QueryContext = QueryContext { use_calibration: false, learn: true };

    fn calibrator() -> Calibrator {
        Calibrator::new(CalibrationConfig::learning().with_trust_factor(1.5).unwrap())
    }

    #[test]
    fn test_calibration_off_uses_default_estimator() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().never();
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().with(eq(KEY)).times(1).returning(|_| 12.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        let estimate = hooks.relation_rows(&QueryContext::default(), &mut calibrator, KEY);
        assert_eq!(estimate, RowEstimate { rows: 12.0, predicted: None, assumption: None });
        assert!(!calibrator.is_initialized());
    }

    #[test]
    fn test_learning_only_consults_predictor() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().with(eq(KEY)).times(2).returning(|_| Some(50.0));
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().with(eq(KEY)).times(1).returning(|_| 12.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        let estimate = hooks.relation_rows(&LEARN, &mut calibrator, KEY);
        assert_eq!(estimate, RowEstimate { rows: 12.0, predicted: Some(50.0), assumption: None });
        // Serving wins when both switches are on
        let both = QueryContext { use_calibration: true, learn: true };
        assert_eq!(hooks.relation_rows(&both, &mut calibrator, KEY).rows, 50.0);
        assert!(!calibrator.is_initialized());
        assert_eq!(hooks.plan_chosen(&LEARN, &mut calibrator, [KEY]), 0);
    }

    #[test]
    fn test_learning_with_refusal() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().times(1).returning(|_| Some(-1.0));
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().times(1).returning(|_| 12.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        let estimate = hooks.relation_rows(&LEARN, &mut calibrator, KEY);
        assert_eq!(estimate, RowEstimate { rows: 12.0, predicted: None, assumption: None });
        assert!(!calibrator.is_initialized());
    }

    #[test]
    fn test_prediction_wins() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().with(eq(KEY)).returning(|_| Some(321.0));
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().never();
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        let estimate = hooks.relation_rows(&USE, &mut calibrator, KEY);
        assert_eq!(estimate, RowEstimate { rows: 321.0, predicted: Some(321.0), assumption: None });
        assert!(calibrator.lookup(KEY).is_none());
    }

    #[test]
    fn test_refusal_goes_through_calibrator() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().returning(|_| None);
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().times(3).returning(|_| 100.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        let first = hooks.relation_rows(&USE, &mut calibrator, KEY);
        assert_eq!(first, RowEstimate { rows: 150.0, predicted: None, assumption: Some(KEY) });

        assert_eq!(hooks.plan_chosen(&USE, &mut calibrator, [KEY, AssumptionKey::new(1, 78)]), 1);
        let second = hooks.relation_rows(&USE, &mut calibrator, KEY);
        assert_eq!(second.rows, 1500.0);

        let third = hooks.relation_rows(&USE, &mut calibrator, KEY);
        assert_eq!(third.rows, 1500.0);
        assert_eq!(calibrator.lookup(KEY).unwrap().usage_counter(), 3);
    }

    #[test]
    fn test_negative_prediction_is_a_refusal() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().returning(|_| Some(-1.0));
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().returning(|_| 10.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();

        assert_eq!(hooks.relation_rows(&USE, &mut calibrator, KEY).rows, 15.0);
    }

    #[test]
    fn test_frozen_refusal_has_no_assumption() {
        let mut predictor = MockRowPredictor::new();
        predictor.expect_predict().returning(|_| None);
        let mut default_estimator = MockDefaultEstimator::new();
        default_estimator.expect_estimate_rows().returning(|_| 10.0);
        let hooks = CardinalityHooks::new(predictor, default_estimator);
        let mut calibrator = calibrator();
        calibrator.set_mode(EstimationMode::Frozen);

        let estimate = hooks.relation_rows(&USE, &mut calibrator, KEY);
        assert_eq!(estimate, RowEstimate { rows: 10.0, predicted: None, assumption: None });
        assert_eq!(hooks.plan_chosen(&USE, &mut calibrator, [KEY]), 0);
    }

    #[test]
    fn test_plan_chosen_without_calibration() {
        let hooks = CardinalityHooks::new(MockRowPredictor::new(), MockDefaultEstimator::new());
        let mut calibrator = calibrator();
        calibrator.calibrate(KEY, 3.0);
        assert_eq!(hooks.plan_chosen(&QueryContext::default(), &mut calibrator, [KEY]), 0);
        assert!(!calibrator.lookup(KEY).unwrap().awaiting_verification());
    }
}
