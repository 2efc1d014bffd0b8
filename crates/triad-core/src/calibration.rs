//! Calibration tracking against named target values.
//!
//! A [`CalibrationTracker`] is a [`TickSink`] that watches one observable
//! per target and remembers the macro-tick whose observed value came closest
//! by relative error. Targets are plain configuration; the engine knows
//! nothing about them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use triad_types::TickEvent;

use crate::runner::{SinkError, TickSink};

/// Which value of a snapshot a target is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observable {
    /// Upsilon.
    Upsilon,
    /// Beta.
    Beta,
    /// Koppa.
    Koppa,
    /// `upsilon / beta`.
    #[default]
    Ratio,
}

impl Observable {
    /// Read this observable from a snapshot as an `f64`.
    ///
    /// Returns `None` for a ratio with a zero beta, or when the value does
    /// not fit a finite `f64`.
    pub fn observe(self, event: &TickEvent) -> Option<f64> {
        let value = match self {
            Self::Upsilon => event.upsilon.to_f64(),
            Self::Beta => event.beta.to_f64(),
            Self::Koppa => event.koppa.to_f64(),
            Self::Ratio => event.upsilon.checked_div(&event.beta).ok()?.to_f64(),
        };
        value.is_finite().then_some(value)
    }
}

/// One calibration target.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetSpec {
    /// Target value.
    pub value: f64,
    /// Observable compared against `value`.
    #[serde(default)]
    pub observable: Observable,
}

/// The `calibration` config section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationConfig {
    /// Named targets; reported in name order.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetSpec>,

    /// Relative error at or below which a match counts as calibrated.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            targets: BTreeMap::new(),
            tolerance: default_tolerance(),
        }
    }
}

const fn default_tolerance() -> f64 {
    0.01
}

/// The closest observation seen for a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestMatch {
    /// Macro-tick of the observation.
    pub tick: u64,
    /// Engine step of the observation.
    pub step: u64,
    /// Observed value.
    pub observed: f64,
    /// `|observed - target| / |target|`, or `|observed|` for a zero target.
    pub relative_error: f64,
}

/// One line of the calibration report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRow {
    /// Target name.
    pub name: String,
    /// Observable tracked.
    pub observable: Observable,
    /// Target value.
    pub target: f64,
    /// Closest observation, if any was finite.
    pub best: Option<BestMatch>,
    /// Whether `best` is within the configured tolerance.
    pub within_tolerance: bool,
}

#[derive(Debug, Clone)]
struct Tracked {
    name: String,
    spec: TargetSpec,
    best: Option<BestMatch>,
}

/// Tracks the best match per target over a run.
#[derive(Debug, Clone)]
pub struct CalibrationTracker {
    tolerance: f64,
    targets: Vec<Tracked>,
}

impl CalibrationTracker {
    /// Create a tracker for every target in `config`.
    pub fn new(config: &CalibrationConfig) -> Self {
        let targets = config
            .targets
            .iter()
            .map(|(name, spec)| Tracked {
                name: name.clone(),
                spec: spec.clone(),
                best: None,
            })
            .collect();
        Self {
            tolerance: config.tolerance,
            targets,
        }
    }

    /// True when no targets are configured.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Feed one snapshot.
    pub fn observe(&mut self, tick: u64, event: &TickEvent) {
        for tracked in &mut self.targets {
            let Some(observed) = tracked.spec.observable.observe(event) else {
                continue;
            };
            let relative_error = relative_error(observed, tracked.spec.value);
            if tracked
                .best
                .is_none_or(|best| relative_error < best.relative_error)
            {
                tracked.best = Some(BestMatch {
                    tick,
                    step: event.step,
                    observed,
                    relative_error,
                });
            }
        }
    }

    /// The current report, one row per target in name order.
    pub fn report(&self) -> Vec<CalibrationRow> {
        self.targets
            .iter()
            .map(|tracked| CalibrationRow {
                name: tracked.name.clone(),
                observable: tracked.spec.observable,
                target: tracked.spec.value,
                best: tracked.best,
                within_tolerance: tracked
                    .best
                    .is_some_and(|best| best.relative_error <= self.tolerance),
            })
            .collect()
    }

    /// Log the report, one line per target.
    pub fn log_report(&self) {
        for row in self.report() {
            match row.best {
                Some(best) => info!(
                    target_name = %row.name,
                    observable = ?row.observable,
                    target = row.target,
                    observed = best.observed,
                    relative_error = best.relative_error,
                    tick = best.tick,
                    within_tolerance = row.within_tolerance,
                    "Calibration"
                ),
                None => warn!(
                    target_name = %row.name,
                    observable = ?row.observable,
                    "Calibration target never observed"
                ),
            }
        }
    }
}

impl TickSink for CalibrationTracker {
    fn on_event(&mut self, tick: u64, event: &TickEvent) -> Result<(), SinkError> {
        self.observe(tick, event);
        Ok(())
    }
}

#[allow(clippy::arithmetic_side_effects)]
fn relative_error(observed: f64, target: f64) -> f64 {
    if target.abs() < f64::EPSILON {
        observed.abs()
    } else {
        ((observed - target) / target).abs()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use triad_types::{BigInt, RationalValue, Rho};

    use super::*;

    fn event(step: u64, upsilon: (i64, i64), beta: (i64, i64)) -> TickEvent {
        TickEvent {
            step,
            microtick: 11,
            rho: Rho::None,
            upsilon: RationalValue::new(upsilon.0, upsilon.1).unwrap(),
            beta: RationalValue::new(beta.0, beta.1).unwrap(),
            koppa: RationalValue::new(3, 2).unwrap(),
            transformed: false,
            psi_precursor: BigInt::from(0),
        }
    }

    fn config(targets: &[(&str, f64, Observable)]) -> CalibrationConfig {
        CalibrationConfig {
            targets: targets
                .iter()
                .map(|(name, value, observable)| {
                    (
                        (*name).to_owned(),
                        TargetSpec {
                            value: *value,
                            observable: *observable,
                        },
                    )
                })
                .collect(),
            tolerance: 0.01,
        }
    }

    #[test]
    fn observables_read_the_right_field() {
        let e = event(1, (3, 1), (2, 1));
        assert!((Observable::Upsilon.observe(&e).unwrap() - 3.0).abs() < 1e-12);
        assert!((Observable::Beta.observe(&e).unwrap() - 2.0).abs() < 1e-12);
        assert!((Observable::Koppa.observe(&e).unwrap() - 1.5).abs() < 1e-12);
        assert!((Observable::Ratio.observe(&e).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn ratio_with_zero_beta_is_unobservable() {
        let e = event(1, (3, 1), (0, 1));
        assert_eq!(Observable::Ratio.observe(&e), None);
    }

    #[test]
    fn keeps_the_closest_observation() {
        let mut tracker = CalibrationTracker::new(&config(&[("phi", 1.618, Observable::Ratio)]));
        tracker.observe(1, &event(1, (3, 1), (2, 1)));
        tracker.observe(2, &event(2, (13, 1), (8, 1)));
        tracker.observe(3, &event(3, (5, 1), (3, 1)));

        let report = tracker.report();
        let row = report.first().unwrap();
        let best = row.best.unwrap();
        assert_eq!(best.tick, 2);
        assert!((best.observed - 1.625).abs() < 1e-12);
        assert!(row.within_tolerance);
    }

    #[test]
    fn flags_targets_outside_tolerance() {
        let mut tracker = CalibrationTracker::new(&config(&[("u", 3.5, Observable::Upsilon)]));
        tracker.observe(1, &event(1, (3, 1), (1, 1)));
        let report = tracker.report();
        let row = report.first().unwrap();
        assert!(!row.within_tolerance);
        assert!(row.best.is_some());
    }

    #[test]
    fn unobserved_target_has_no_match() {
        let mut tracker = CalibrationTracker::new(&config(&[("r", 2.0, Observable::Ratio)]));
        tracker.observe(1, &event(1, (3, 1), (0, 1)));
        let report = tracker.report();
        let row = report.first().unwrap();
        assert_eq!(row.best, None);
        assert!(!row.within_tolerance);
    }

    #[test]
    fn zero_target_uses_absolute_error() {
        let mut tracker = CalibrationTracker::new(&config(&[("zero", 0.0, Observable::Beta)]));
        tracker.observe(1, &event(1, (1, 1), (1, 200)));
        let report = tracker.report();
        let best = report.first().unwrap().best.unwrap();
        assert!((best.relative_error - 0.005).abs() < 1e-12);
    }

    #[test]
    fn report_is_in_name_order() {
        let tracker = CalibrationTracker::new(&config(&[
            ("zeta", 1.0, Observable::Ratio),
            ("alpha", 1.0, Observable::Koppa),
        ]));
        let names: Vec<String> = tracker.report().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(!tracker.is_empty());
        assert!(CalibrationTracker::new(&CalibrationConfig::default()).is_empty());
    }

    #[test]
    fn config_from_yaml() {
        let yaml = "tolerance: 0.05\n\
                    targets:\n\
                    \x20 phi: { value: 1.618, observable: ratio }\n\
                    \x20 u: { value: 2.5 }\n";
        let config: CalibrationConfig = serde_yml::from_str(yaml).unwrap();
        assert!((config.tolerance - 0.05).abs() < 1e-12);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets.get("u").unwrap().observable, Observable::Ratio);
    }
}
