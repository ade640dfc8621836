//! Outcome Feedback Binder
//!
//! Closes the loop after a goal run: asks the Outcome Judge for a score,
//! writes it into the subject, organization and platform records, and flags
//! regressions against each key's previous score.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use super::collaborators::{Evaluation, OutcomeJudge};
use super::types::GoalOutcome;
use crate::outcomes::{EntityKind, OutcomeMemoryStore, OutcomeRecord, RegressionFlag};
use crate::strategy::StrategyRegistry;

pub const DEFAULT_JUDGE_TIMEOUT_SECS: u64 = 60;

/// Platform key used when no strategy handled a goal
pub const GENERAL_PLATFORM: &str = "general";

/// Which records a run updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeKeys {
    pub subject: String,
    pub organization: Option<String>,
    pub platform: Option<String>,
}

impl OutcomeKeys {
    /// Derive keys from a finished run.
    ///
    /// Subject is the first named entity (or the goal text), organization the
    /// host of the last page visited, platform the strategy that steered the
    /// run.
    pub fn for_outcome(outcome: &GoalOutcome, registry: &StrategyRegistry) -> Self {
        let subject = outcome
            .sub_goals
            .iter()
            .find_map(|s| s.focus_entity.clone())
            .unwrap_or_else(|| outcome.goal.clone());

        let organization = outcome
            .trace
            .steps()
            .iter()
            .rev()
            .find_map(|step| step.observation.host())
            .map(|host| host.trim_start_matches("www.").to_string());

        let platform = outcome
            .trace
            .steps()
            .iter()
            .rev()
            .find_map(|step| step.info.reorientation.as_ref().map(|r| r.strategy.clone()))
            .or_else(|| {
                registry
                    .applicable(&outcome.goal, None)
                    .map(|s| s.name().to_string())
            })
            .unwrap_or_else(|| GENERAL_PLATFORM.to_string());

        Self {
            subject,
            organization,
            platform: Some(platform),
        }
    }

    fn entries(&self) -> Vec<(EntityKind, &str)> {
        let mut entries = vec![(EntityKind::Subject, self.subject.as_str())];
        if let Some(org) = &self.organization {
            entries.push((EntityKind::Organization, org.as_str()));
        }
        if let Some(platform) = &self.platform {
            entries.push((EntityKind::Platform, platform.as_str()));
        }
        entries
    }
}

/// Regression raised for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRegression {
    pub kind: EntityKind,
    pub key: String,
    #[serde(flatten)]
    pub flag: RegressionFlag,
}

/// What one feedback pass did
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackReport {
    pub evaluation: Evaluation,
    pub records: Vec<OutcomeRecord>,
    pub regressions: Vec<EntityRegression>,
}

impl FeedbackReport {
    pub fn is_regression(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Binds judge verdicts to the outcome store
pub struct OutcomeFeedbackBinder {
    judge: Arc<dyn OutcomeJudge>,
    store: Arc<OutcomeMemoryStore>,
    judge_timeout: Duration,
    regression_threshold: f64,
}

impl OutcomeFeedbackBinder {
    pub fn new(judge: Arc<dyn OutcomeJudge>, store: Arc<OutcomeMemoryStore>) -> Self {
        Self {
            judge,
            store,
            judge_timeout: Duration::from_secs(DEFAULT_JUDGE_TIMEOUT_SECS),
            regression_threshold: crate::outcomes::REGRESSION_THRESHOLD,
        }
    }

    pub fn with_judge_timeout(mut self, judge_timeout: Duration) -> Self {
        self.judge_timeout = judge_timeout;
        self
    }

    pub fn with_regression_threshold(mut self, threshold: f64) -> Self {
        self.regression_threshold = threshold;
        self
    }

    pub fn store(&self) -> &OutcomeMemoryStore {
        &self.store
    }

    /// Judge `outcome` and record the verdict under `keys`.
    ///
    /// Judge failures degrade to a neutral evaluation; store failures are
    /// returned.
    pub async fn bind(&self, outcome: &GoalOutcome, keys: &OutcomeKeys) -> Result<FeedbackReport> {
        let evaluation = self.evaluate(outcome).await;

        let mut issues = evaluation.issues.clone();
        if let Some(error) = outcome.trace.first_error() {
            issues.push(error.to_string());
        }

        let timestamp = chrono::Utc::now().timestamp();
        let (records, regressions) = self
            .record_score(keys, evaluation.global_score, &issues, timestamp)
            .await?;

        Ok(FeedbackReport {
            evaluation,
            records,
            regressions,
        })
    }

    /// Record a known score without consulting the judge
    pub async fn apply_score(
        &self,
        keys: &OutcomeKeys,
        score: Option<f64>,
        issues: &[String],
        timestamp: i64,
    ) -> Result<FeedbackReport> {
        let (records, regressions) = self.record_score(keys, score, issues, timestamp).await?;
        Ok(FeedbackReport {
            evaluation: Evaluation {
                overall_success: score.is_some(),
                global_score: score,
                issues: issues.to_vec(),
                strengths: Vec::new(),
                recommendations: Vec::new(),
            },
            records,
            regressions,
        })
    }

    async fn evaluate(&self, outcome: &GoalOutcome) -> Evaluation {
        match timeout(
            self.judge_timeout,
            self.judge
                .evaluate(&outcome.goal, &outcome.trace, &outcome.metrics),
        )
        .await
        {
            Ok(Ok(evaluation)) => evaluation,
            Ok(Err(e)) => {
                warn!("Outcome judge failed for '{}': {}", outcome.goal, e);
                Evaluation::neutral()
            }
            Err(_) => {
                warn!(
                    "Outcome judge timed out for '{}' after {}s",
                    outcome.goal,
                    self.judge_timeout.as_secs()
                );
                Evaluation::neutral()
            }
        }
    }

    async fn record_score(
        &self,
        keys: &OutcomeKeys,
        score: Option<f64>,
        issues: &[String],
        timestamp: i64,
    ) -> Result<(Vec<OutcomeRecord>, Vec<EntityRegression>)> {
        let applied = score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 1.0));
        let mut records = Vec::new();
        let mut regressions = Vec::new();

        for (kind, key) in keys.entries() {
            let update = self
                .store
                .update_outcome(kind, key, applied, issues, timestamp)
                .await?;

            if let Some(flag) =
                RegressionFlag::detect(update.previous_score, applied, self.regression_threshold)
            {
                warn!(
                    "Regression on {} '{}': {:.2} -> {:.2} ({:+.2})",
                    kind, update.record.key, flag.previous_score, flag.current_score, flag.delta
                );
                regressions.push(EntityRegression {
                    kind,
                    key: update.record.key.clone(),
                    flag,
                });
            }
            records.push(update.record);
        }

        info!(
            "Recorded outcome for '{}' (score {:?}, {} regression(s))",
            keys.subject,
            applied,
            regressions.len()
        );

        Ok((records, regressions))
    }
}
