//! Multi-agent voting consensus
//!
//! A consensus session collects one ballot per agent on a topic and
//! resolves them under a voting rule. Ballot choices are arbitrary JSON
//! values; identical values are the same option. Ranked-choice ballots
//! carry preference arrays, Bayesian ballots carry probability maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Errors from the consensus engine
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Unknown voting rule: {0}")]
    UnknownRule(String),
    #[error("Invalid ballot: {0}")]
    InvalidBallot(String),
    #[error("Session is not open (status: {0})")]
    SessionNotOpen(String),
}

/// How ballots are resolved into a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingRule {
    /// All ballots must carry the identical choice
    Unanimous,
    /// Winner needs more than half of the ballots
    Majority,
    /// Winner needs a configurable share, 2/3 by default
    SuperMajority,
    /// Ballots weighted by reported confidence
    Weighted,
    /// Preference arrays, instant-runoff elimination
    RankedChoice,
    /// Probability maps pooled by confidence
    Bayesian,
}

impl VotingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unanimous => "unanimous",
            Self::Majority => "majority",
            Self::SuperMajority => "supermajority",
            Self::Weighted => "weighted",
            Self::RankedChoice => "ranked_choice",
            Self::Bayesian => "bayesian",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConsensusError> {
        match s.to_lowercase().as_str() {
            "unanimous" => Ok(Self::Unanimous),
            "majority" => Ok(Self::Majority),
            "supermajority" => Ok(Self::SuperMajority),
            "weighted" => Ok(Self::Weighted),
            "ranked_choice" => Ok(Self::RankedChoice),
            "bayesian" => Ok(Self::Bayesian),
            other => Err(ConsensusError::UnknownRule(other.to_string())),
        }
    }

    /// Default agreement threshold for the rule
    pub fn default_threshold(&self) -> f64 {
        match self {
            Self::SuperMajority => 2.0 / 3.0,
            _ => 0.5,
        }
    }
}

/// Lifecycle of a consensus session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
    Reached,
    Failed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reached => "reached",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "closed" => Self::Closed,
            "reached" => Self::Reached,
            "failed" => Self::Failed,
            "expired" => Self::Expired,
            _ => Self::Open,
        }
    }
}

/// One agent's vote in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub agent_id: String,
    pub choice: Value,
    /// Confidence in the choice, clamped to [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(agent_id: &str, choice: Value, confidence: f64, reasoning: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            choice,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.to_string(),
            cast_at: Utc::now(),
        }
    }
}

/// Outcome of tallying a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub reached: bool,
    pub decision: Option<Value>,
    pub confidence: f64,
    /// Option (serialized choice) -> support, in tally units of the rule
    pub tallies: Vec<(String, f64)>,
    pub summary: String,
}

impl ConsensusOutcome {
    fn none(summary: &str) -> Self {
        Self {
            reached: false,
            decision: None,
            confidence: 0.0,
            tallies: Vec::new(),
            summary: summary.to_string(),
        }
    }
}

/// Tally ballots under the given rule. `threshold` only applies to
/// majority-family rules; pass `rule.default_threshold()` when the session
/// does not override it.
pub fn tally(rule: VotingRule, ballots: &[Ballot], threshold: f64) -> ConsensusOutcome {
    if ballots.is_empty() {
        return ConsensusOutcome::none("No ballots cast");
    }
    match rule {
        VotingRule::Unanimous => tally_unanimous(ballots),
        VotingRule::Majority | VotingRule::SuperMajority => tally_majority(ballots, threshold),
        VotingRule::Weighted => tally_weighted(ballots),
        VotingRule::RankedChoice => tally_ranked_choice(ballots),
        VotingRule::Bayesian => tally_bayesian(ballots),
    }
}

fn tally_unanimous(ballots: &[Ballot]) -> ConsensusOutcome {
    let first = &ballots[0].choice;
    let mut min_confidence = ballots[0].confidence;
    for ballot in &ballots[1..] {
        if &ballot.choice != first {
            return ConsensusOutcome::none("No unanimous agreement");
        }
        min_confidence = min_confidence.min(ballot.confidence);
    }
    ConsensusOutcome {
        reached: true,
        decision: Some(first.clone()),
        confidence: min_confidence,
        tallies: vec![(first.to_string(), ballots.len() as f64)],
        summary: format!("Unanimous agreement across {} ballots", ballots.len()),
    }
}

fn tally_majority(ballots: &[Ballot], threshold: f64) -> ConsensusOutcome {
    let mut counts: HashMap<String, (f64, f64, Value)> = HashMap::new();
    for ballot in ballots {
        let key = ballot.choice.to_string();
        let entry = counts
            .entry(key)
            .or_insert_with(|| (0.0, 0.0, ballot.choice.clone()));
        entry.0 += 1.0;
        entry.1 += ballot.confidence;
    }

    let total = ballots.len() as f64;
    let required = (total * threshold).ceil().max(1.0);

    let mut tallies: Vec<(String, f64)> = counts.iter().map(|(k, v)| (k.clone(), v.0)).collect();
    tallies.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (count, confidence_sum, choice) = counts
        .iter()
        .max_by(|a, b| {
            a.1 .0
                .partial_cmp(&b.1 .0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.cmp(a.0))
        })
        .map(|(_, v)| v.clone())
        .expect("ballots checked non-empty");

    if count >= required {
        ConsensusOutcome {
            reached: true,
            decision: Some(choice),
            confidence: confidence_sum / count,
            tallies,
            summary: format!("Majority reached: {}/{} ballots", count as u64, total as u64),
        }
    } else {
        ConsensusOutcome {
            reached: false,
            decision: None,
            confidence: 0.0,
            tallies,
            summary: format!(
                "Insufficient support: {}/{} ballots required",
                count as u64, required as u64
            ),
        }
    }
}

fn tally_weighted(ballots: &[Ballot]) -> ConsensusOutcome {
    let mut weights: HashMap<String, (f64, Value)> = HashMap::new();
    let mut total_weight = 0.0;
    for ballot in ballots {
        let key = ballot.choice.to_string();
        let entry = weights.entry(key).or_insert_with(|| (0.0, ballot.choice.clone()));
        entry.0 += ballot.confidence;
        total_weight += ballot.confidence;
    }

    if total_weight <= 0.0 {
        return ConsensusOutcome::none("All ballots carried zero confidence");
    }

    let mut tallies: Vec<(String, f64)> = weights.iter().map(|(k, v)| (k.clone(), v.0)).collect();
    tallies.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (weight, choice) = weights
        .into_iter()
        .max_by(|a, b| {
            a.1 .0
                .partial_cmp(&b.1 .0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.cmp(&a.0))
        })
        .map(|(_, v)| v)
        .expect("ballots checked non-empty");

    let share = weight / total_weight;
    if share > 0.5 {
        ConsensusOutcome {
            reached: true,
            decision: Some(choice),
            confidence: share,
            tallies,
            summary: format!("Weighted consensus at {:.1}% of total weight", share * 100.0),
        }
    } else {
        ConsensusOutcome {
            reached: false,
            decision: None,
            confidence: share,
            tallies,
            summary: format!("Insufficient weighted support: {:.1}%", share * 100.0),
        }
    }
}

fn tally_ranked_choice(ballots: &[Ballot]) -> ConsensusOutcome {
    // Each ballot is an ordered preference array of option strings
    let mut preferences: Vec<Vec<String>> = Vec::new();
    for ballot in ballots {
        match ballot.choice.as_array() {
            Some(prefs) if !prefs.is_empty() => {
                preferences.push(
                    prefs
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect(),
                );
            }
            _ => return ConsensusOutcome::none("Ranked-choice ballots must be preference arrays"),
        }
    }

    let total = preferences.len() as f64;
    let mut eliminated: Vec<String> = Vec::new();

    loop {
        // First-preference counts among surviving options
        let mut counts: HashMap<String, f64> = HashMap::new();
        for prefs in &preferences {
            if let Some(first) = prefs.iter().find(|p| !eliminated.contains(*p)) {
                *counts.entry(first.clone()).or_insert(0.0) += 1.0;
            }
        }

        if counts.is_empty() {
            return ConsensusOutcome::none("All preferences eliminated without a majority");
        }

        let mut tallies: Vec<(String, f64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        tallies.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (leader, leader_count) = tallies[0].clone();
        if leader_count > total / 2.0 {
            let confidence = mean_confidence_for(ballots, &leader);
            return ConsensusOutcome {
                reached: true,
                decision: Some(Value::String(leader.clone())),
                confidence,
                tallies,
                summary: format!(
                    "Ranked-choice winner with {}/{} first preferences after {} elimination(s)",
                    leader_count as u64,
                    total as u64,
                    eliminated.len()
                ),
            };
        }

        if counts.len() <= 2 {
            return ConsensusOutcome {
                reached: false,
                decision: None,
                confidence: 0.0,
                tallies,
                summary: "No ranked-choice majority between final options".to_string(),
            };
        }

        // Eliminate the trailing option (deterministic tie-break by name)
        let loser = tallies
            .iter()
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            })
            .map(|(k, _)| k.clone())
            .expect("counts non-empty");
        eliminated.push(loser);
    }
}

fn mean_confidence_for(ballots: &[Ballot], option: &str) -> f64 {
    let matching: Vec<f64> = ballots
        .iter()
        .filter(|b| {
            b.choice
                .as_array()
                .and_then(|a| a.first())
                .and_then(|v| v.as_str())
                == Some(option)
        })
        .map(|b| b.confidence)
        .collect();
    if matching.is_empty() {
        0.5
    } else {
        matching.iter().sum::<f64>() / matching.len() as f64
    }
}

fn tally_bayesian(ballots: &[Ballot]) -> ConsensusOutcome {
    // Ballots carry probability maps; pool them weighted by confidence
    let mut pooled: HashMap<String, f64> = HashMap::new();
    let mut contributions: HashMap<String, f64> = HashMap::new();

    for ballot in ballots {
        let Some(map) = ballot.choice.as_object() else {
            return ConsensusOutcome::none("Bayesian ballots must be probability maps");
        };
        for (option, prob) in map {
            if let Some(p) = prob.as_f64() {
                *pooled.entry(option.clone()).or_insert(0.0) += p * ballot.confidence;
                *contributions.entry(option.clone()).or_insert(0.0) += ballot.confidence;
            }
        }
    }

    if pooled.is_empty() {
        return ConsensusOutcome::none("No numeric probabilities in ballots");
    }

    for (option, sum) in pooled.iter_mut() {
        let weight = contributions.get(option).copied().unwrap_or(1.0);
        if weight > 0.0 {
            *sum /= weight;
        }
    }

    let mut tallies: Vec<(String, f64)> = pooled.iter().map(|(k, v)| (k.clone(), *v)).collect();
    tallies.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (option, probability) = tallies[0].clone();
    if probability > 0.5 {
        ConsensusOutcome {
            reached: true,
            decision: Some(Value::String(option)),
            confidence: probability,
            tallies,
            summary: format!("Bayesian consensus at {:.1}% pooled probability", probability * 100.0),
        }
    } else {
        ConsensusOutcome {
            reached: false,
            decision: None,
            confidence: probability,
            tallies,
            summary: format!("Insufficient pooled probability: {:.1}%", probability * 100.0),
        }
    }
}
