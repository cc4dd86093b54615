pub mod parser;

use itertools::Itertools;
use thiserror::Error;
use tracing::warn;

use crate::{assumptions::{calibration::Calibrator, AssumptionKey}, catalog::{self, ASSUMPTIONS_ATTRIBUTES, ASSUMPTIONS_VIEW, ASSUMPTION_CANDIDATES_ATTRIBUTES, ASSUMPTION_CANDIDATES_VIEW}, config::EstimationMode, types::{Tuple, TupleValueType}};

use self::parser::{parse_command, Command};

pub const HELP: &str = "\
calibrate <space> <fingerprint> <rows>   calibrate a raw planner estimate
mark <space> <fingerprint>               flag an assumption as used in a chosen plan
drop <space> <fingerprint> <rows>        drop the candidate for a raw estimate
assumptions                              list assumptions
candidates                               list candidates of all assumptions
mode <disabled|learning|frozen>          switch estimation mode
enable | disable                         switch assumptions on or off
help | quit";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("could not parse command '{0}', try 'help'")]
    Parse(String),
    #[error("cannot switch the estimation mode to disabled while assumptions are enabled, run 'disable' first")]
    DisabledWhileEnabled,
    #[error("cannot enable assumptions while the estimation mode is disabled")]
    EnableWhileDisabled,
    #[error("assumption key {0} has a zero fingerprint, which never identifies a site")]
    ZeroFingerprint(AssumptionKey),
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Output(String),
    Quit
}

/// Line based administration of one calibrator.
pub struct Console {
    calibrator: Calibrator
}

impl Console {
    pub fn new(calibrator: Calibrator) -> Console {
        Console { calibrator }
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn execute(&mut self, line: &str) -> Result<Outcome, ConsoleError> {
        let (_, command) = parse_command(line).map_err(|_| ConsoleError::Parse(line.trim().to_string()))?;
        let output = match command {
            Command::Calibrate { key, rows } => {
                if key.fingerprint == 0 {
                    return Err(ConsoleError::ZeroFingerprint(key));
                }
                if self.calibrator.config().enabled && self.calibrator.config().mode == EstimationMode::Disabled {
                    // Would trip the calibrator's precondition. Only reachable through the environment config
                    return Err(ConsoleError::EnableWhileDisabled);
                }
                format!("{}", self.calibrator.calibrate(key, rows))
            },
            Command::Mark(key) => {
                if self.calibrator.mark_awaiting_verification(key) {
                    format!("marked {}", key)
                } else {
                    format!("no assumption for {}", key)
                }
            },
            Command::Drop { key, rows } => {
                if self.calibrator.drop_candidate(key, rows) {
                    format!("dropped {} @ {}", key, rows)
                } else {
                    format!("no candidate {} @ {}", key, rows)
                }
            },
            Command::Assumptions => render_table(ASSUMPTIONS_VIEW, &ASSUMPTIONS_ATTRIBUTES, &catalog::store_assumptions(&self.calibrator)),
            Command::Candidates => render_table(ASSUMPTION_CANDIDATES_VIEW, &ASSUMPTION_CANDIDATES_ATTRIBUTES, &catalog::store_assumption_candidates(&self.calibrator)),
            Command::Mode(mode) => {
                if mode == EstimationMode::Disabled && self.calibrator.config().enabled {
                    warn!("refusing to disable estimation while assumptions are enabled");
                    return Err(ConsoleError::DisabledWhileEnabled);
                }
                self.calibrator.set_mode(mode);
                format!("mode {}", mode)
            },
            Command::Enable => {
                if self.calibrator.config().mode == EstimationMode::Disabled {
                    return Err(ConsoleError::EnableWhileDisabled);
                }
                self.calibrator.set_enabled(true);
                "assumptions enabled".to_string()
            },
            Command::Disable => {
                self.calibrator.set_enabled(false);
                "assumptions disabled".to_string()
            },
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Output(output))
    }
}

fn render_table(view: &str, attributes: &[(&str, TupleValueType)], rows: &[Tuple]) -> String {
    let header = attributes.iter().map(|(name, _)| name).join(" | ");
    let footer = format!("({} {})", rows.len(), if rows.len() == 1 { "row" } else { "rows" });
    [view.to_string(), header].into_iter()
        .chain(rows.iter().map(|r| r.to_string()))
        .chain(std::iter::once(footer))
        .join("\n")
}

#[cfg(test)]
mod test {
    use crate::config::CalibrationConfig;

    use super::*;

    fn get_testee() -> Console {
        Console::new(Calibrator::new(CalibrationConfig::learning().with_trust_factor(2.0).unwrap()))
    }

    fn output(console: &mut Console, line: &str) -> String {
        match console.execute(line) {
            Ok(Outcome::Output(output)) => output,
            other => panic!("unexpected result for '{}': {:?}", line, other)
        }
    }

    #[test]
    fn test_calibrate_mark_and_list() {
        let mut console = get_testee();
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "200");
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "200");
        assert_eq!(output(&mut console, "mark 1 42"), "marked (1, 42)");
        assert_eq!(output(&mut console, "mark 1 43"), "no assumption for (1, 43)");
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "2000");
        assert_eq!(
            output(&mut console, "assumptions"),
            "assumptions\nspace | fingerprint | awaiting_verification | usage_counter\n1 | 42 | f | 3\n(1 row)"
        );
        assert_eq!(
            output(&mut console, "candidates"),
            "assumption_candidates\nspace | fingerprint | observed_estimate | calibrated_estimate\n1 | 42 | 100 | 2000\n(1 row)"
        );
    }

    #[test]
    fn test_drop() {
        let mut console = get_testee();
        output(&mut console, "calibrate 1 42 100");
        assert_eq!(output(&mut console, "drop 1 42 5"), "no candidate (1, 42) @ 5");
        assert_eq!(output(&mut console, "drop 1 42 100"), "dropped (1, 42) @ 100");
        assert_eq!(output(&mut console, "assumptions"), "assumptions\nspace | fingerprint | awaiting_verification | usage_counter\n(0 rows)");
    }

    #[test]
    fn test_modes() {
        let mut console = get_testee();
        assert_eq!(output(&mut console, "mode frozen"), "mode frozen");
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "100");
        assert!(console.calibrator().lookup(crate::assumptions::AssumptionKey::new(1, 42)).is_none());
        assert_eq!(console.execute("mode disabled"), Err(ConsoleError::DisabledWhileEnabled));
        assert_eq!(output(&mut console, "disable"), "assumptions disabled");
        assert_eq!(output(&mut console, "mode disabled"), "mode disabled");
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "100");
        assert_eq!(console.execute("enable"), Err(ConsoleError::EnableWhileDisabled));
        assert_eq!(output(&mut console, "mode learning"), "mode learning");
        assert_eq!(output(&mut console, "enable"), "assumptions enabled");
        assert_eq!(output(&mut console, "calibrate 1 42 100"), "200");
    }

    #[test]
    fn test_errors_and_quit() {
        let mut console = get_testee();
        assert_eq!(console.execute("  calibrate x "), Err(ConsoleError::Parse("calibrate x".to_string())));
        assert_eq!(console.execute("quit"), Ok(Outcome::Quit));
        assert!(output(&mut console, "help").starts_with("calibrate"));
        assert!(!console.calibrator().is_initialized());
    }

    #[test]
    fn test_zero_fingerprint_is_rejected() {
        let mut console = get_testee();
        assert_eq!(console.execute("calibrate 1 0 100"), Err(ConsoleError::ZeroFingerprint(AssumptionKey::new(1, 0))));
        assert!(!console.calibrator().is_initialized());
        // Marking and dropping a zero fingerprint only miss
        assert_eq!(output(&mut console, "mark 1 0"), "no assumption for (1, 0)");
        assert_eq!(output(&mut console, "drop 1 0 100"), "no candidate (1, 0) @ 100");
    }

    #[test]
    fn test_enabled_with_disabled_mode_rejects_calibrate() {
        let config = CalibrationConfig::learning().with_mode(EstimationMode::Disabled);
        let mut console = Console::new(Calibrator::new(config));
        assert_eq!(console.execute("calibrate 1 1 1"), Err(ConsoleError::EnableWhileDisabled));
    }
}
