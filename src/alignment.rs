//! Alignment gate: charter check before any stage runs.
//!
//! The gate compares an incoming request against the project charter and
//! yields one of three decisions. Only `Aligned` lets the coordinator
//! proceed; the other two halt the workflow before the first stage.
//!
//! The semantic judgment itself is behind the [`AlignmentJudge`] trait so a
//! conforming implementation can be a rule engine, a classifier, or a human
//! review queue. The built-in [`KeywordJudge`] is a deterministic rule
//! engine over the charter's keyword lists.

use serde::{Deserialize, Serialize};

use crate::charter::Charter;

/// Outcome of evaluating a request against the charter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The request serves the charter; the pipeline may run
    Aligned,
    /// The request conflicts with the charter; the cited rule explains why
    Rejected { reason: String },
    /// The charter cannot place the request; the requester must clarify
    NeedsClarification { question: String },
}

impl Decision {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned)
    }
}

/// The judgment algorithm behind the gate.
///
/// Implementations must be deterministic given the same request and charter.
pub trait AlignmentJudge: Send + Sync {
    fn judge(&self, request: &str, charter: &Charter) -> Decision;
}

/// Deterministic rule engine over charter keywords.
///
/// Constraint and out-of-scope rules are checked first so a request that
/// touches both a goal and a constraint is still rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordJudge;

impl AlignmentJudge for KeywordJudge {
    fn judge(&self, request: &str, charter: &Charter) -> Decision {
        if let Some(rule) = charter.constraints.iter().find(|r| r.matches(request)) {
            return Decision::Rejected {
                reason: format!("violates constraint: {}", rule.summary),
            };
        }

        if let Some(rule) = charter.out_of_scope.iter().find(|r| r.matches(request)) {
            return Decision::Rejected {
                reason: format!("out of scope: {}", rule.summary),
            };
        }

        let serves_charter = charter
            .goals
            .iter()
            .chain(charter.in_scope.iter())
            .any(|r| r.matches(request));

        if serves_charter {
            Decision::Aligned
        } else {
            let goals: Vec<&str> = charter.goals.iter().map(|g| g.summary.as_str()).collect();
            Decision::NeedsClarification {
                question: format!(
                    "How does this request serve the charter goals ({})?",
                    goals.join("; ")
                ),
            }
        }
    }
}

/// The pre-pipeline check that a request serves the declared charter.
pub struct AlignmentGate {
    judge: Box<dyn AlignmentJudge>,
}

impl Default for AlignmentGate {
    fn default() -> Self {
        Self {
            judge: Box::new(KeywordJudge),
        }
    }
}

impl AlignmentGate {
    pub fn with_judge(judge: impl AlignmentJudge + 'static) -> Self {
        Self {
            judge: Box::new(judge),
        }
    }

    /// Evaluate a request against the charter.
    ///
    /// The caller records the decision in the workflow manifest; the gate
    /// itself has no side effects.
    pub fn evaluate(&self, request: &str, charter: &Charter) -> Decision {
        let decision = self.judge.judge(request, charter);
        match &decision {
            Decision::Aligned => tracing::info!("request aligned with charter"),
            Decision::Rejected { reason } => {
                tracing::warn!(%reason, "request rejected by alignment gate")
            }
            Decision::NeedsClarification { question } => {
                tracing::info!(%question, "request needs clarification")
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charter::CharterRule;

    fn sample_charter() -> Charter {
        Charter {
            goals: vec![CharterRule::new("Ship a reliable auth service", &[
                "auth", "login", "session",
            ])],
            in_scope: vec![CharterRule::new("Auth API endpoints", &["endpoint", "api"])],
            out_of_scope: vec![CharterRule::new("Mobile client work", &["mobile", "ios"])],
            constraints: vec![CharterRule::new("No third-party SaaS dependencies", &[
                "saas",
                "sdk",
                "telemetry",
            ])],
        }
    }

    #[test]
    fn test_aligned_request() {
        let gate = AlignmentGate::default();
        let decision = gate.evaluate("add login rate limiting", &sample_charter());
        assert_eq!(decision, Decision::Aligned);
        assert!(decision.is_aligned());
    }

    #[test]
    fn test_constraint_violation_rejected_with_citation() {
        let gate = AlignmentGate::default();
        let decision = gate.evaluate("add a proprietary telemetry SDK", &sample_charter());
        match decision {
            Decision::Rejected { reason } => {
                assert!(
                    reason.contains("No third-party SaaS dependencies"),
                    "reason must cite the constraint, got: {reason}"
                );
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_constraint_wins_over_goal_match() {
        // Request touches a goal keyword and a constraint keyword at once.
        let gate = AlignmentGate::default();
        let decision = gate.evaluate("wire login through a SaaS provider", &sample_charter());
        assert!(matches!(decision, Decision::Rejected { .. }));
    }

    #[test]
    fn test_out_of_scope_rejected() {
        let gate = AlignmentGate::default();
        let decision = gate.evaluate("build the iOS companion app", &sample_charter());
        match decision {
            Decision::Rejected { reason } => assert!(reason.contains("Mobile client work")),
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_unrelated_request_needs_clarification() {
        let gate = AlignmentGate::default();
        let decision = gate.evaluate("repaint the office walls", &sample_charter());
        match decision {
            Decision::NeedsClarification { question } => {
                assert!(question.contains("Ship a reliable auth service"));
            }
            other => panic!("Expected NeedsClarification, got {other:?}"),
        }
    }

    #[test]
    fn test_judge_is_deterministic() {
        let gate = AlignmentGate::default();
        let charter = sample_charter();
        let first = gate.evaluate("add login rate limiting", &charter);
        let second = gate.evaluate("add login rate limiting", &charter);
        assert_eq!(first, second);
    }

    #[test]
    fn test_decision_serialization_is_tagged() {
        let json = serde_json::to_string(&Decision::Rejected {
            reason: "nope".into(),
        })
        .unwrap();
        assert!(json.contains("\"decision\":\"rejected\""));
        let parsed: Decision = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Decision::Rejected { .. }));
    }

    #[test]
    fn test_custom_judge_is_pluggable() {
        struct AlwaysAligned;
        impl AlignmentJudge for AlwaysAligned {
            fn judge(&self, _request: &str, _charter: &Charter) -> Decision {
                Decision::Aligned
            }
        }

        let gate = AlignmentGate::with_judge(AlwaysAligned);
        let decision = gate.evaluate("anything", &Charter::default());
        assert_eq!(decision, Decision::Aligned);
    }
}
