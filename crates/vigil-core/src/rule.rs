//! Alert rule definitions and condition evaluation.
//!
//! A rule is either platform-standardized (`org_id == None`) and
//! applies to every organization, or org-scoped. An organization that
//! wants to tune a standardized rule clones it into its own scope
//! (clone-on-customize); the clone shadows its origin for that org.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{MetricId, OrgId, RuleId};
use crate::types::{Comparator, ConditionOutcome, Severity};

/// Maximum allowed length for rule names.
pub const MAX_RULE_NAME_LENGTH: usize = 256;

/// Direction a trend condition watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Values increasing over the lookback window.
    Rising,
    /// Values decreasing over the lookback window.
    Falling,
}

/// How a composite condition combines its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// Every part must breach.
    All,
    /// At least one part must breach.
    Any,
}

/// A single observation point used for trend evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    /// When the value was recorded.
    pub recorded_at: DateTime<Utc>,
    /// The recorded value.
    pub value: f64,
}

/// Evaluation context handed to a condition.
///
/// `value` is the incoming observation for point-in-time checks and is
/// `None` for scheduled checks (missing-data). `history` holds recent
/// points for the same (patient, metric), oldest first.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    /// The incoming observation value, if any.
    pub value: Option<f64>,
    /// Recent observation history, oldest first.
    pub history: &'a [ObservationPoint],
    /// When the metric was last recorded, if ever.
    pub last_recorded_at: Option<DateTime<Utc>>,
    /// The evaluation instant.
    pub now: DateTime<Utc>,
}

/// The predicate a rule evaluates against observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum RuleCondition {
    /// Compare the incoming value against a threshold. Covers both
    /// threshold-exceeded and threshold-below via the comparator.
    Threshold {
        /// The comparison operator.
        comparator: Comparator,
        /// The threshold value.
        threshold: f64,
    },
    /// Watch for a sustained move across a lookback window.
    Trend {
        /// Direction of the move.
        direction: TrendDirection,
        /// Minimum number of points required inside the window.
        min_points: usize,
        /// Lookback window in minutes.
        lookback_minutes: i64,
        /// Minimum absolute change between the oldest and newest
        /// points to count as a breach.
        min_delta: f64,
    },
    /// Fire when no observation arrived within the expected cadence.
    MissingData {
        /// Expected reporting cadence in minutes.
        cadence_minutes: i64,
    },
    /// Combine sub-conditions.
    Composite {
        /// Combination mode.
        mode: CompositeMode,
        /// The sub-conditions.
        parts: Vec<RuleCondition>,
    },
}

impl RuleCondition {
    /// Convenience constructor for a threshold condition.
    #[must_use]
    pub const fn threshold(comparator: Comparator, threshold: f64) -> Self {
        Self::Threshold { comparator, threshold }
    }

    /// The comparator of a threshold condition, if this is one.
    ///
    /// Used by the rule store to enforce comparator immutability once
    /// a rule is referenced by alerts.
    #[must_use]
    pub const fn comparator(&self) -> Option<Comparator> {
        match self {
            Self::Threshold { comparator, .. } => Some(*comparator),
            _ => None,
        }
    }

    /// The threshold value, if this is a threshold condition.
    #[must_use]
    pub const fn threshold_value(&self) -> Option<f64> {
        match self {
            Self::Threshold { threshold, .. } => Some(*threshold),
            _ => None,
        }
    }

    /// Evaluates the condition in the given context.
    ///
    /// Insufficient data yields [`ConditionOutcome::NotEvaluable`],
    /// never an error.
    #[must_use]
    pub fn evaluate(&self, cx: &EvalContext<'_>) -> ConditionOutcome {
        match self {
            Self::Threshold { comparator, threshold } => match cx.value {
                Some(value) if comparator.evaluate(value, *threshold) => {
                    ConditionOutcome::Breached(value)
                }
                Some(_) => ConditionOutcome::Ok,
                None => ConditionOutcome::NotEvaluable,
            },
            Self::Trend {
                direction,
                min_points,
                lookback_minutes,
                min_delta,
            } => {
                let cutoff = cx.now - Duration::minutes(*lookback_minutes);
                let window: Vec<&ObservationPoint> = cx
                    .history
                    .iter()
                    .filter(|p| p.recorded_at >= cutoff)
                    .collect();

                if window.len() < *min_points {
                    return ConditionOutcome::NotEvaluable;
                }

                // History is oldest-first.
                let first = window[0].value;
                let last = window[window.len() - 1].value;
                let delta = last - first;

                let breached = match direction {
                    TrendDirection::Rising => delta >= *min_delta,
                    TrendDirection::Falling => -delta >= *min_delta,
                };

                if breached {
                    ConditionOutcome::Breached(last)
                } else {
                    ConditionOutcome::Ok
                }
            }
            Self::MissingData { cadence_minutes } => {
                let gap = match cx.last_recorded_at {
                    Some(last) => cx.now.signed_duration_since(last),
                    // Never reported at all counts as missing.
                    None => return ConditionOutcome::Breached(f64::from(u32::MAX)),
                };

                if gap > Duration::minutes(*cadence_minutes) {
                    ConditionOutcome::Breached(gap.num_minutes() as f64)
                } else {
                    ConditionOutcome::Ok
                }
            }
            Self::Composite { mode, parts } => {
                let mut last_breach = None;
                let mut any_unevaluable = false;
                let mut all_breached = !parts.is_empty();

                for part in parts {
                    match part.evaluate(cx) {
                        ConditionOutcome::Breached(v) => last_breach = Some(v),
                        ConditionOutcome::Ok => all_breached = false,
                        ConditionOutcome::NotEvaluable => {
                            any_unevaluable = true;
                            all_breached = false;
                        }
                    }
                }

                match mode {
                    // All needs every part confirmed; an unevaluable
                    // part leaves the composite undecided.
                    CompositeMode::All if any_unevaluable => ConditionOutcome::NotEvaluable,
                    CompositeMode::All => match (all_breached, last_breach) {
                        (true, Some(v)) => ConditionOutcome::Breached(v),
                        _ => ConditionOutcome::Ok,
                    },
                    // Any: an established breach stands regardless of
                    // parts that could not be evaluated.
                    CompositeMode::Any => match last_breach {
                        Some(v) => ConditionOutcome::Breached(v),
                        None if any_unevaluable => ConditionOutcome::NotEvaluable,
                        None => ConditionOutcome::Ok,
                    },
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Threshold { .. } => Ok(()),
            Self::Trend {
                min_points,
                lookback_minutes,
                min_delta,
                ..
            } => {
                if *min_points < 2 {
                    return Err(CoreError::InvalidRule {
                        reason: "trend requires at least 2 points".to_string(),
                    });
                }
                if *lookback_minutes <= 0 {
                    return Err(CoreError::InvalidRule {
                        reason: "trend lookback must be positive".to_string(),
                    });
                }
                if *min_delta <= 0.0 {
                    return Err(CoreError::InvalidRule {
                        reason: "trend delta must be positive".to_string(),
                    });
                }
                Ok(())
            }
            Self::MissingData { cadence_minutes } => {
                if *cadence_minutes <= 0 {
                    return Err(CoreError::InvalidRule {
                        reason: "missing-data cadence must be positive".to_string(),
                    });
                }
                Ok(())
            }
            Self::Composite { parts, .. } => {
                if parts.is_empty() {
                    return Err(CoreError::InvalidRule {
                        reason: "composite condition needs at least one part".to_string(),
                    });
                }
                for part in parts {
                    part.validate()?;
                }
                Ok(())
            }
        }
    }
}

/// A monitoring rule that generates alerts from observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique identifier for the rule.
    pub id: RuleId,
    /// Owning organization; `None` means platform-standardized.
    pub org_id: Option<OrgId>,
    /// Human-readable name.
    pub name: String,
    /// The clinical metric this rule watches.
    pub metric: MetricId,
    /// The predicate to evaluate.
    pub condition: RuleCondition,
    /// Severity of alerts produced by this rule. Captured onto each
    /// alert at creation time; later rule edits never retroactively
    /// change historical alerts.
    pub severity: Severity,
    /// Whether this rule is evaluated.
    pub enabled: bool,
    /// Monotonically increasing version, bumped on every update.
    pub version: u32,
    /// The standardized rule this was cloned from, if any.
    pub cloned_from: Option<RuleId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Creates a new rule builder.
    pub fn builder(name: impl Into<String>, metric: MetricId, condition: RuleCondition) -> AlertRuleBuilder {
        AlertRuleBuilder::new(name, metric, condition)
    }

    /// Returns true if this rule is platform-standardized.
    #[must_use]
    pub const fn is_standardized(&self) -> bool {
        self.org_id.is_none()
    }

    /// Clones this rule into an organization's scope so it can be
    /// customized without affecting other tenants.
    ///
    /// The clone gets a fresh id, version 1, and records its lineage.
    #[must_use]
    pub fn clone_for_org(&self, org_id: OrgId) -> Self {
        Self {
            id: RuleId::new(),
            org_id: Some(org_id),
            version: 1,
            cloned_from: Some(self.id),
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Builder for [`AlertRule`] instances.
#[derive(Debug)]
pub struct AlertRuleBuilder {
    name: String,
    metric: MetricId,
    condition: RuleCondition,
    org_id: Option<OrgId>,
    severity: Severity,
    enabled: bool,
}

impl AlertRuleBuilder {
    fn new(name: impl Into<String>, metric: MetricId, condition: RuleCondition) -> Self {
        Self {
            name: name.into(),
            metric,
            condition,
            org_id: None,
            severity: Severity::Medium,
            enabled: true,
        }
    }

    /// Scope the rule to an organization.
    #[must_use]
    pub const fn org(mut self, org_id: OrgId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Set the severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set whether the rule is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builds the rule.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRule`] if the name is empty or too
    /// long, or the condition parameters are invalid.
    pub fn build(self) -> Result<AlertRule> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidRule {
                reason: "rule name cannot be empty".to_string(),
            });
        }

        if self.name.len() > MAX_RULE_NAME_LENGTH {
            return Err(CoreError::InvalidRule {
                reason: format!("rule name exceeds maximum length of {MAX_RULE_NAME_LENGTH} characters"),
            });
        }

        self.condition.validate()?;

        Ok(AlertRule {
            id: RuleId::new(),
            org_id: self.org_id,
            name: self.name,
            metric: self.metric,
            condition: self.condition,
            severity: self.severity,
            enabled: self.enabled,
            version: 1,
            cloned_from: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(key: &str) -> MetricId {
        MetricId::new(key).unwrap()
    }

    fn points(values: &[(i64, f64)], now: DateTime<Utc>) -> Vec<ObservationPoint> {
        values
            .iter()
            .map(|(mins_ago, value)| ObservationPoint {
                recorded_at: now - Duration::minutes(*mins_ago),
                value: *value,
            })
            .collect()
    }

    mod threshold_tests {
        use super::*;

        #[test]
        fn breach_above_threshold() {
            let cond = RuleCondition::threshold(Comparator::GreaterThanOrEqual, 8.0);
            let cx = EvalContext {
                value: Some(9.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Breached(9.0));
        }

        #[test]
        fn ok_below_threshold() {
            let cond = RuleCondition::threshold(Comparator::GreaterThanOrEqual, 8.0);
            let cx = EvalContext {
                value: Some(5.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Ok);
        }

        #[test]
        fn threshold_below_via_comparator() {
            let cond = RuleCondition::threshold(Comparator::LessThan, 90.0);
            let cx = EvalContext {
                value: Some(85.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert!(cond.evaluate(&cx).is_breached());
        }

        #[test]
        fn no_value_is_not_evaluable() {
            let cond = RuleCondition::threshold(Comparator::GreaterThan, 8.0);
            let cx = EvalContext {
                value: None,
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::NotEvaluable);
        }
    }

    mod trend_tests {
        use super::*;

        fn rising_trend() -> RuleCondition {
            RuleCondition::Trend {
                direction: TrendDirection::Rising,
                min_points: 3,
                lookback_minutes: 60,
                min_delta: 10.0,
            }
        }

        #[test]
        fn insufficient_points_not_evaluable() {
            let now = Utc::now();
            let history = points(&[(30, 100.0), (10, 105.0)], now);
            let cx = EvalContext {
                value: Some(105.0),
                history: &history,
                last_recorded_at: None,
                now,
            };
            assert_eq!(rising_trend().evaluate(&cx), ConditionOutcome::NotEvaluable);
        }

        #[test]
        fn rising_breach() {
            let now = Utc::now();
            let history = points(&[(50, 100.0), (30, 108.0), (10, 115.0)], now);
            let cx = EvalContext {
                value: Some(115.0),
                history: &history,
                last_recorded_at: None,
                now,
            };
            assert_eq!(rising_trend().evaluate(&cx), ConditionOutcome::Breached(115.0));
        }

        #[test]
        fn flat_series_ok() {
            let now = Utc::now();
            let history = points(&[(50, 100.0), (30, 102.0), (10, 103.0)], now);
            let cx = EvalContext {
                value: Some(103.0),
                history: &history,
                last_recorded_at: None,
                now,
            };
            assert_eq!(rising_trend().evaluate(&cx), ConditionOutcome::Ok);
        }

        #[test]
        fn points_outside_lookback_are_ignored() {
            let now = Utc::now();
            // Only two points inside the 60 minute window.
            let history = points(&[(120, 50.0), (30, 100.0), (10, 115.0)], now);
            let cx = EvalContext {
                value: Some(115.0),
                history: &history,
                last_recorded_at: None,
                now,
            };
            assert_eq!(rising_trend().evaluate(&cx), ConditionOutcome::NotEvaluable);
        }

        #[test]
        fn falling_trend_breach() {
            let cond = RuleCondition::Trend {
                direction: TrendDirection::Falling,
                min_points: 2,
                lookback_minutes: 60,
                min_delta: 5.0,
            };
            let now = Utc::now();
            let history = points(&[(40, 98.0), (10, 91.0)], now);
            let cx = EvalContext {
                value: Some(91.0),
                history: &history,
                last_recorded_at: None,
                now,
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Breached(91.0));
        }
    }

    mod missing_data_tests {
        use super::*;

        #[test]
        fn gap_past_cadence_breaches() {
            let cond = RuleCondition::MissingData { cadence_minutes: 60 };
            let now = Utc::now();
            let cx = EvalContext {
                value: None,
                history: &[],
                last_recorded_at: Some(now - Duration::minutes(90)),
                now,
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Breached(90.0));
        }

        #[test]
        fn recent_data_is_ok() {
            let cond = RuleCondition::MissingData { cadence_minutes: 60 };
            let now = Utc::now();
            let cx = EvalContext {
                value: None,
                history: &[],
                last_recorded_at: Some(now - Duration::minutes(15)),
                now,
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Ok);
        }

        #[test]
        fn never_reported_breaches() {
            let cond = RuleCondition::MissingData { cadence_minutes: 60 };
            let cx = EvalContext {
                value: None,
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert!(cond.evaluate(&cx).is_breached());
        }
    }

    mod composite_tests {
        use super::*;

        #[test]
        fn all_mode_requires_every_part() {
            let cond = RuleCondition::Composite {
                mode: CompositeMode::All,
                parts: vec![
                    RuleCondition::threshold(Comparator::GreaterThan, 8.0),
                    RuleCondition::threshold(Comparator::LessThan, 20.0),
                ],
            };
            let cx = EvalContext {
                value: Some(10.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert!(cond.evaluate(&cx).is_breached());

            let cx = EvalContext {
                value: Some(25.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Ok);
        }

        #[test]
        fn any_mode_takes_one_part() {
            let cond = RuleCondition::Composite {
                mode: CompositeMode::Any,
                parts: vec![
                    RuleCondition::threshold(Comparator::GreaterThan, 100.0),
                    RuleCondition::threshold(Comparator::LessThan, 5.0),
                ],
            };
            let cx = EvalContext {
                value: Some(2.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert!(cond.evaluate(&cx).is_breached());
        }

        #[test]
        fn any_mode_breach_wins_over_unevaluable_part() {
            // The threshold part breaches; the trend part lacks data.
            let cond = RuleCondition::Composite {
                mode: CompositeMode::Any,
                parts: vec![
                    RuleCondition::threshold(Comparator::GreaterThan, 1.0),
                    RuleCondition::Trend {
                        direction: TrendDirection::Rising,
                        min_points: 5,
                        lookback_minutes: 60,
                        min_delta: 1.0,
                    },
                ],
            };
            let cx = EvalContext {
                value: Some(10.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::Breached(10.0));
        }

        #[test]
        fn any_mode_without_breach_stays_unevaluable() {
            let cond = RuleCondition::Composite {
                mode: CompositeMode::Any,
                parts: vec![
                    RuleCondition::threshold(Comparator::GreaterThan, 100.0),
                    RuleCondition::Trend {
                        direction: TrendDirection::Rising,
                        min_points: 5,
                        lookback_minutes: 60,
                        min_delta: 1.0,
                    },
                ],
            };
            let cx = EvalContext {
                value: Some(10.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::NotEvaluable);
        }

        #[test]
        fn all_mode_unevaluable_part_leaves_composite_undecided() {
            let cond = RuleCondition::Composite {
                mode: CompositeMode::All,
                parts: vec![
                    RuleCondition::threshold(Comparator::GreaterThan, 1.0),
                    RuleCondition::Trend {
                        direction: TrendDirection::Rising,
                        min_points: 5,
                        lookback_minutes: 60,
                        min_delta: 1.0,
                    },
                ],
            };
            let cx = EvalContext {
                value: Some(10.0),
                history: &[],
                last_recorded_at: None,
                now: Utc::now(),
            };
            assert_eq!(cond.evaluate(&cx), ConditionOutcome::NotEvaluable);
        }
    }

    mod rule_tests {
        use super::*;

        #[test]
        fn build_rule() {
            let rule = AlertRule::builder(
                "High pain score",
                metric("pain_score"),
                RuleCondition::threshold(Comparator::GreaterThanOrEqual, 8.0),
            )
            .severity(Severity::High)
            .build()
            .unwrap();

            assert_eq!(rule.name, "High pain score");
            assert_eq!(rule.severity, Severity::High);
            assert_eq!(rule.version, 1);
            assert!(rule.enabled);
            assert!(rule.is_standardized());
            assert!(rule.cloned_from.is_none());
        }

        #[test]
        fn empty_name_fails() {
            let result = AlertRule::builder(
                "",
                metric("pain_score"),
                RuleCondition::threshold(Comparator::GreaterThan, 8.0),
            )
            .build();
            assert!(matches!(result, Err(CoreError::InvalidRule { .. })));
        }

        #[test]
        fn long_name_fails() {
            let result = AlertRule::builder(
                "x".repeat(MAX_RULE_NAME_LENGTH + 1),
                metric("pain_score"),
                RuleCondition::threshold(Comparator::GreaterThan, 8.0),
            )
            .build();
            assert!(result.is_err());
        }

        #[test]
        fn invalid_trend_params_fail() {
            let result = AlertRule::builder(
                "Bad trend",
                metric("weight_kg"),
                RuleCondition::Trend {
                    direction: TrendDirection::Rising,
                    min_points: 1,
                    lookback_minutes: 60,
                    min_delta: 2.0,
                },
            )
            .build();
            assert!(result.is_err());
        }

        #[test]
        fn empty_composite_fails() {
            let result = AlertRule::builder(
                "Empty composite",
                metric("pain_score"),
                RuleCondition::Composite {
                    mode: CompositeMode::All,
                    parts: vec![],
                },
            )
            .build();
            assert!(result.is_err());
        }

        #[test]
        fn clone_for_org_records_lineage() {
            let standard = AlertRule::builder(
                "High pain score",
                metric("pain_score"),
                RuleCondition::threshold(Comparator::GreaterThanOrEqual, 8.0),
            )
            .severity(Severity::High)
            .build()
            .unwrap();

            let org = OrgId::new();
            let clone = standard.clone_for_org(org);

            assert_ne!(clone.id, standard.id);
            assert_eq!(clone.org_id, Some(org));
            assert_eq!(clone.cloned_from, Some(standard.id));
            assert_eq!(clone.version, 1);
            assert_eq!(clone.severity, standard.severity);
            assert!(!clone.is_standardized());
        }

        #[test]
        fn rule_serialization_roundtrip() {
            let rule = AlertRule::builder(
                "Rising weight",
                metric("weight_kg"),
                RuleCondition::Trend {
                    direction: TrendDirection::Rising,
                    min_points: 3,
                    lookback_minutes: 4320,
                    min_delta: 2.0,
                },
            )
            .severity(Severity::Medium)
            .build()
            .unwrap();

            let json = serde_json::to_string(&rule).unwrap();
            let back: AlertRule = serde_json::from_str(&json).unwrap();
            assert_eq!(back, rule);
        }
    }
}
