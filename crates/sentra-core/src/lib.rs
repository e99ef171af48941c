//! # Sentra Core
//!
//! Domain algorithms for the Sentra compliance backend:
//! - [`decision`] — multi-criteria decision analysis (weighted models,
//!   TOPSIS, ELECTRE, PROMETHEE, AHP, VIKOR) with sensitivity analysis
//! - [`consensus`] — multi-agent voting (unanimous through Bayesian pooling)
//! - [`mediation`] — conversation mediation and conflict resolution
//! - [`translate`] — wire-protocol translation between agent transports
//! - [`scan`] — fraud detection rule evaluation and risk banding

pub mod consensus;
pub mod decision;
pub mod mediation;
pub mod scan;
pub mod translate;

pub use consensus::{Ballot, ConsensusError, ConsensusOutcome, SessionStatus, VotingRule};
pub use decision::{
    analyze, Alternative, Criterion, CriterionKind, DecisionAnalysis, DecisionError, McdaConfig,
    McdaMethod,
};
pub use mediation::{
    Conversation, ConversationMessage, ConversationState, MediationError, MessageKind,
    Participant, Resolution, ResolutionStrategy, StanceConflict,
};
pub use scan::{
    batch_risk_score, default_rules, evaluate_rule, scan_transaction, AlertSeverity, FraudAlert,
    RiskLevel, RuleKind, ScanRule, TransactionRecord,
};
pub use translate::{
    translate, translate_from, translate_str, CanonicalMessage, TranslateError, Translation,
    WireProtocol,
};
