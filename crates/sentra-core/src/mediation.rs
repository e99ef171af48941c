//! Conversation mediation between agents
//!
//! A conversation carries typed messages between named participants.
//! Agents publish `Stance` messages (`{"subject": ..., "position": ...}`);
//! the mediator detects contradictory stances on the same subject and
//! resolves them with a configurable strategy, recording the resolution
//! back into the transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MediationError {
    #[error("Agent '{0}' is not a participant")]
    NotAParticipant(String),
    #[error("Conversation is {0:?} and no longer accepts messages")]
    ConversationClosed(ConversationState),
    #[error("No conflict found for subject '{0}'")]
    NoSuchConflict(String),
    #[error("Arbiter '{0}' has no recorded stance on the subject")]
    ArbiterSilent(String),
    #[error("Unknown resolution strategy: {0}")]
    UnknownStrategy(String),
    #[error("Participant limit of {0} reached")]
    ParticipantLimit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Active,
    ConflictDetected,
    Resolving,
    ConsensusReached,
    Deadlocked,
    Completed,
    Cancelled,
}

impl ConversationState {
    fn accepts_messages(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Notification,
    /// A position statement the mediator inspects for conflicts
    Stance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub agent_id: String,
    /// facilitator, participant, observer
    #[serde(default = "default_role")]
    pub role: String,
    /// Weight in expertise-weighted resolution
    #[serde(default = "default_expertise")]
    pub expertise_weight: f64,
}

fn default_role() -> String {
    "participant".to_string()
}

fn default_expertise() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub sender: String,
    /// "all" for broadcast
    pub recipient: String,
    pub kind: MessageKind,
    pub content: Value,
    pub sent_at: DateTime<Utc>,
}

/// A contradictory set of stances on one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StanceConflict {
    pub subject: String,
    /// agent id -> asserted position
    pub positions: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    MajorityVote,
    WeightedVote,
    ExpertArbitration,
    Compromise,
}

impl ResolutionStrategy {
    pub fn parse(s: &str) -> Result<Self, MediationError> {
        match s.to_lowercase().as_str() {
            "majority_vote" => Ok(Self::MajorityVote),
            "weighted_vote" => Ok(Self::WeightedVote),
            "expert_arbitration" => Ok(Self::ExpertArbitration),
            "compromise" => Ok(Self::Compromise),
            other => Err(MediationError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub subject: String,
    pub resolved: bool,
    pub outcome: Value,
    pub summary: String,
}

/// Support share a compromise needs before it is adopted outright
const COMPROMISE_ADOPTION_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub topic: String,
    pub objective: String,
    pub state: ConversationState,
    pub participants: Vec<Participant>,
    pub messages: Vec<ConversationMessage>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub max_participants: usize,
}

impl Conversation {
    pub fn new(topic: &str, objective: &str, participants: Vec<Participant>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            objective: objective.to_string(),
            state: ConversationState::Active,
            participants,
            messages: Vec::new(),
            started_at: now,
            last_activity: now,
            max_participants: 10,
        }
    }

    pub fn is_participant(&self, agent_id: &str) -> bool {
        self.participants.iter().any(|p| p.agent_id == agent_id)
    }

    fn participant(&self, agent_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.agent_id == agent_id)
    }

    pub fn add_participant(&mut self, participant: Participant) -> Result<(), MediationError> {
        if self.participants.len() >= self.max_participants {
            return Err(MediationError::ParticipantLimit(self.max_participants));
        }
        if !self.is_participant(&participant.agent_id) {
            self.participants.push(participant);
        }
        Ok(())
    }

    /// Append a message from a participant. Stance messages may flip the
    /// conversation into `ConflictDetected`.
    pub fn append_message(
        &mut self,
        sender: &str,
        recipient: &str,
        kind: MessageKind,
        content: Value,
    ) -> Result<&ConversationMessage, MediationError> {
        if !self.state.accepts_messages() {
            return Err(MediationError::ConversationClosed(self.state));
        }
        if !self.is_participant(sender) {
            return Err(MediationError::NotAParticipant(sender.to_string()));
        }

        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            kind,
            content,
            sent_at: Utc::now(),
        });
        self.last_activity = Utc::now();

        if kind == MessageKind::Stance && !self.detect_conflicts().is_empty() {
            self.state = ConversationState::ConflictDetected;
        }

        Ok(self.messages.last().expect("message just pushed"))
    }

    /// Latest stance per (agent, subject), grouped by subject; a conflict is
    /// a subject with more than one distinct position.
    pub fn detect_conflicts(&self) -> Vec<StanceConflict> {
        let mut latest: HashMap<(String, String), Value> = HashMap::new();
        for message in &self.messages {
            if message.kind != MessageKind::Stance {
                continue;
            }
            let Some(subject) = message.content.get("subject").and_then(Value::as_str) else {
                continue;
            };
            let position = message
                .content
                .get("position")
                .cloned()
                .unwrap_or(Value::Null);
            // Later messages overwrite: iteration is transcript order
            latest.insert((message.sender.clone(), subject.to_string()), position);
        }

        let mut by_subject: HashMap<String, Vec<(String, Value)>> = HashMap::new();
        for ((agent, subject), position) in latest {
            by_subject.entry(subject).or_default().push((agent, position));
        }

        let mut conflicts: Vec<StanceConflict> = by_subject
            .into_iter()
            .filter_map(|(subject, mut positions)| {
                positions.sort_by(|a, b| a.0.cmp(&b.0));
                let distinct = positions
                    .iter()
                    .map(|(_, p)| p.to_string())
                    .collect::<std::collections::HashSet<_>>();
                if distinct.len() > 1 {
                    Some(StanceConflict { subject, positions })
                } else {
                    None
                }
            })
            .collect();
        conflicts.sort_by(|a, b| a.subject.cmp(&b.subject));
        conflicts
    }

    /// Resolve the conflict on `subject` with the given strategy. The
    /// resolution is appended to the transcript as a mediator notification
    /// and the conversation state advances.
    pub fn resolve(
        &mut self,
        subject: &str,
        strategy: ResolutionStrategy,
        arbiter: Option<&str>,
    ) -> Result<Resolution, MediationError> {
        let conflict = self
            .detect_conflicts()
            .into_iter()
            .find(|c| c.subject == subject)
            .ok_or_else(|| MediationError::NoSuchConflict(subject.to_string()))?;

        self.state = ConversationState::Resolving;

        let resolution = match strategy {
            ResolutionStrategy::MajorityVote => self.resolve_majority(&conflict),
            ResolutionStrategy::WeightedVote => self.resolve_weighted(&conflict),
            ResolutionStrategy::ExpertArbitration => {
                let arbiter =
                    arbiter.ok_or_else(|| MediationError::ArbiterSilent("<unset>".to_string()))?;
                self.resolve_arbitration(&conflict, arbiter)?
            }
            ResolutionStrategy::Compromise => self.resolve_compromise(&conflict),
        };

        self.state = if resolution.resolved {
            ConversationState::ConsensusReached
        } else {
            ConversationState::Deadlocked
        };

        self.messages.push(ConversationMessage {
            id: Uuid::new_v4(),
            sender: "mediator".to_string(),
            recipient: "all".to_string(),
            kind: MessageKind::Notification,
            content: json!({
                "subject": resolution.subject,
                "resolved": resolution.resolved,
                "outcome": resolution.outcome,
                "summary": resolution.summary,
            }),
            sent_at: Utc::now(),
        });
        self.last_activity = Utc::now();

        tracing::info!(
            conversation_id = %self.id,
            subject = subject,
            strategy = ?strategy,
            resolved = resolution.resolved,
            "conflict resolution applied"
        );

        Ok(resolution)
    }

    fn position_support(&self, conflict: &StanceConflict, weighted: bool) -> Vec<(Value, f64)> {
        let mut support: HashMap<String, (Value, f64)> = HashMap::new();
        for (agent, position) in &conflict.positions {
            let weight = if weighted {
                self.participant(agent).map(|p| p.expertise_weight).unwrap_or(1.0)
            } else {
                1.0
            };
            let entry = support
                .entry(position.to_string())
                .or_insert_with(|| (position.clone(), 0.0));
            entry.1 += weight;
        }
        let mut ranked: Vec<(Value, f64)> = support.into_values().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.to_string().cmp(&b.0.to_string()))
        });
        ranked
    }

    fn resolve_majority(&self, conflict: &StanceConflict) -> Resolution {
        let ranked = self.position_support(conflict, false);
        let total: f64 = ranked.iter().map(|(_, w)| w).sum();
        let (winner, count) = ranked[0].clone();
        let resolved = count > total / 2.0;
        Resolution {
            strategy: ResolutionStrategy::MajorityVote,
            subject: conflict.subject.clone(),
            resolved,
            outcome: if resolved { winner } else { Value::Null },
            summary: if resolved {
                format!("Majority position holds {:.0}/{:.0} stances", count, total)
            } else {
                "No position holds a strict majority".to_string()
            },
        }
    }

    fn resolve_weighted(&self, conflict: &StanceConflict) -> Resolution {
        let ranked = self.position_support(conflict, true);
        let total: f64 = ranked.iter().map(|(_, w)| w).sum();
        let (winner, weight) = ranked[0].clone();
        let resolved = total > 0.0 && weight > total / 2.0;
        Resolution {
            strategy: ResolutionStrategy::WeightedVote,
            subject: conflict.subject.clone(),
            resolved,
            outcome: if resolved { winner } else { Value::Null },
            summary: format!(
                "Leading position carries {:.1}% of expertise weight",
                if total > 0.0 { weight / total * 100.0 } else { 0.0 }
            ),
        }
    }

    fn resolve_arbitration(
        &self,
        conflict: &StanceConflict,
        arbiter: &str,
    ) -> Result<Resolution, MediationError> {
        let position = conflict
            .positions
            .iter()
            .find(|(agent, _)| agent == arbiter)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| MediationError::ArbiterSilent(arbiter.to_string()))?;
        Ok(Resolution {
            strategy: ResolutionStrategy::ExpertArbitration,
            subject: conflict.subject.clone(),
            resolved: true,
            outcome: position,
            summary: format!("Arbitrated by {}", arbiter),
        })
    }

    fn resolve_compromise(&self, conflict: &StanceConflict) -> Resolution {
        let ranked = self.position_support(conflict, true);
        let total: f64 = ranked.iter().map(|(_, w)| w).sum();
        let (leader, weight) = ranked[0].clone();
        let share = if total > 0.0 { weight / total } else { 0.0 };

        if share >= COMPROMISE_ADOPTION_SHARE {
            Resolution {
                strategy: ResolutionStrategy::Compromise,
                subject: conflict.subject.clone(),
                resolved: true,
                outcome: leader,
                summary: format!("Compromise adopted the dominant position ({:.0}% support)", share * 100.0),
            }
        } else {
            let positions: Vec<Value> = ranked.iter().map(|(p, _)| p.clone()).collect();
            Resolution {
                strategy: ResolutionStrategy::Compromise,
                subject: conflict.subject.clone(),
                resolved: false,
                outcome: json!({ "unreconciled_positions": positions }),
                summary: "No position dominant enough for compromise".to_string(),
            }
        }
    }

    pub fn complete(&mut self) {
        self.state = ConversationState::Completed;
        self.last_activity = Utc::now();
    }

    pub fn cancel(&mut self) {
        self.state = ConversationState::Cancelled;
        self.last_activity = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str, weight: f64) -> Participant {
        Participant {
            agent_id: id.to_string(),
            role: "participant".to_string(),
            expertise_weight: weight,
        }
    }

    fn conversation() -> Conversation {
        Conversation::new(
            "transaction 42 review",
            "decide whether to flag",
            vec![
                participant("guardian", 2.0),
                participant("assessor", 1.0),
                participant("auditor", 1.0),
            ],
        )
    }

    fn stance(convo: &mut Conversation, agent: &str, position: &str) {
        convo
            .append_message(
                agent,
                "all",
                MessageKind::Stance,
                json!({"subject": "txn-42", "position": position}),
            )
            .unwrap();
    }

    #[test]
    fn detects_contradictory_stances() {
        let mut convo = conversation();
        stance(&mut convo, "guardian", "flag");
        assert!(convo.detect_conflicts().is_empty());

        stance(&mut convo, "assessor", "clear");
        let conflicts = convo.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].subject, "txn-42");
        assert_eq!(convo.state, ConversationState::ConflictDetected);
    }

    #[test]
    fn revised_stance_supersedes_earlier_one() {
        let mut convo = conversation();
        stance(&mut convo, "guardian", "flag");
        stance(&mut convo, "assessor", "clear");
        // Assessor comes around
        stance(&mut convo, "assessor", "flag");
        assert!(convo.detect_conflicts().is_empty());
    }

    #[test]
    fn majority_vote_resolution() {
        let mut convo = conversation();
        stance(&mut convo, "guardian", "flag");
        stance(&mut convo, "assessor", "flag");
        stance(&mut convo, "auditor", "clear");

        let resolution = convo
            .resolve("txn-42", ResolutionStrategy::MajorityVote, None)
            .unwrap();
        assert!(resolution.resolved);
        assert_eq!(resolution.outcome, json!("flag"));
        assert_eq!(convo.state, ConversationState::ConsensusReached);
        // Resolution notification lands in the transcript
        assert_eq!(
            convo.messages.last().unwrap().kind,
            MessageKind::Notification
        );
    }

    #[test]
    fn weighted_vote_respects_expertise() {
        let mut convo = conversation();
        // guardian (weight 2) vs two weight-1 agents: 2 vs 2 is not > 50%
        stance(&mut convo, "guardian", "flag");
        stance(&mut convo, "assessor", "clear");
        stance(&mut convo, "auditor", "clear");

        let resolution = convo
            .resolve("txn-42", ResolutionStrategy::WeightedVote, None)
            .unwrap();
        assert!(!resolution.resolved);
        assert_eq!(convo.state, ConversationState::Deadlocked);
    }

    #[test]
    fn arbitration_takes_the_arbiters_stance() {
        let mut convo = conversation();
        stance(&mut convo, "guardian", "flag");
        stance(&mut convo, "assessor", "clear");

        let resolution = convo
            .resolve(
                "txn-42",
                ResolutionStrategy::ExpertArbitration,
                Some("guardian"),
            )
            .unwrap();
        assert!(resolution.resolved);
        assert_eq!(resolution.outcome, json!("flag"));

        // Arbiter without a stance is an error
        stance(&mut convo, "assessor", "clear");
        stance(&mut convo, "guardian", "flag");
        let err = convo
            .resolve("txn-42", ResolutionStrategy::ExpertArbitration, Some("auditor"))
            .unwrap_err();
        assert!(matches!(err, MediationError::ArbiterSilent(_)));
    }

    #[test]
    fn compromise_deadlocks_without_dominance() {
        let mut convo = conversation();
        stance(&mut convo, "assessor", "clear");
        stance(&mut convo, "auditor", "flag");

        let resolution = convo
            .resolve("txn-42", ResolutionStrategy::Compromise, None)
            .unwrap();
        assert!(!resolution.resolved);
        assert!(resolution.outcome.get("unreconciled_positions").is_some());
    }

    #[test]
    fn joining_is_idempotent_and_bounded() {
        let mut convo = conversation();
        convo.add_participant(participant("guardian", 2.0)).unwrap();
        assert_eq!(convo.participants.len(), 3);

        for i in 0..7 {
            convo
                .add_participant(participant(&format!("agent-{}", i), 1.0))
                .unwrap();
        }
        assert_eq!(convo.participants.len(), 10);
        let err = convo
            .add_participant(participant("one-too-many", 1.0))
            .unwrap_err();
        assert!(matches!(err, MediationError::ParticipantLimit(10)));
    }

    #[test]
    fn non_participants_cannot_post() {
        let mut convo = conversation();
        let err = convo
            .append_message("intruder", "all", MessageKind::Request, json!({}))
            .unwrap_err();
        assert!(matches!(err, MediationError::NotAParticipant(_)));
    }

    #[test]
    fn closed_conversations_reject_messages() {
        let mut convo = conversation();
        convo.complete();
        let err = convo
            .append_message("guardian", "all", MessageKind::Request, json!({}))
            .unwrap_err();
        assert!(matches!(err, MediationError::ConversationClosed(_)));
    }
}
