//! Fraud detection rule evaluation
//!
//! Rules come in three kinds: threshold (numeric comparison against the
//! transaction amount), pattern (named structural checks), and velocity
//! (frequency-style checks). A batch scan evaluates every enabled rule
//! against every transaction and emits alerts for the ones that trigger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Threshold,
    Pattern,
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Contribution of one alert of this severity to a batch risk score
    fn weight(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

/// A detection rule. `definition` holds kind-specific parameters:
/// threshold rules use `{"amount_over": <f64>}`, pattern and velocity
/// rules use `{"pattern": "<name>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRule {
    pub id: String,
    pub name: String,
    pub kind: RuleKind,
    pub definition: Value,
    pub severity: AlertSeverity,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub from_account: String,
    pub to_account: String,
    /// domestic, international, internal, ...
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub transaction_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Evaluate one rule against one transaction.
pub fn evaluate_rule(rule: &ScanRule, txn: &TransactionRecord) -> bool {
    match rule.kind {
        RuleKind::Threshold => rule
            .definition
            .get("amount_over")
            .and_then(Value::as_f64)
            .map(|threshold| txn.amount > threshold)
            .unwrap_or(false),
        RuleKind::Pattern => match rule.definition.get("pattern").and_then(Value::as_str) {
            Some("same_account") => txn.from_account == txn.to_account,
            Some("international_high_value") => txn.kind == "international" && txn.amount > 5_000.0,
            Some("unusual_currency") => txn.currency != "USD" && txn.amount > 1_000.0,
            _ => false,
        },
        RuleKind::Velocity => match rule.definition.get("pattern").and_then(Value::as_str) {
            // Frequency data lives upstream; the in-process check gates on
            // the amount band velocity rules care about.
            Some("multiple_large") => txn.amount > 5_000.0,
            _ => false,
        },
    }
}

/// Evaluate all enabled rules against a transaction and collect alerts.
pub fn scan_transaction(rules: &[ScanRule], txn: &TransactionRecord) -> Vec<FraudAlert> {
    rules
        .iter()
        .filter(|rule| rule.enabled && evaluate_rule(rule, txn))
        .map(|rule| FraudAlert {
            transaction_id: txn.id.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: rule.severity,
            message: format!("Transaction flagged by rule: {}", rule.name),
        })
        .collect()
}

/// Coarse risk bands used in scan summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            Self::Low
        } else if score < 0.6 {
            Self::Medium
        } else if score < 0.85 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Severity-weighted risk score for a completed batch, in [0, 1].
pub fn batch_risk_score(processed: usize, alerts: &[FraudAlert]) -> f64 {
    if processed == 0 {
        return 0.0;
    }
    let weighted: f64 = alerts.iter().map(|a| a.severity.weight()).sum();
    (weighted / processed as f64).min(1.0)
}

/// Default rule set applied when no rules are configured; mirrors the
/// stock compliance rules shipped with the detection models.
pub fn default_rules() -> Vec<ScanRule> {
    vec![
        ScanRule {
            id: "rule-large-amount".to_string(),
            name: "Large transaction amount".to_string(),
            kind: RuleKind::Threshold,
            definition: serde_json::json!({"amount_over": 10_000.0}),
            severity: AlertSeverity::High,
            enabled: true,
        },
        ScanRule {
            id: "rule-self-transfer".to_string(),
            name: "Same source and destination account".to_string(),
            kind: RuleKind::Pattern,
            definition: serde_json::json!({"pattern": "same_account"}),
            severity: AlertSeverity::Medium,
            enabled: true,
        },
        ScanRule {
            id: "rule-intl-high-value".to_string(),
            name: "High-value international transfer".to_string(),
            kind: RuleKind::Pattern,
            definition: serde_json::json!({"pattern": "international_high_value"}),
            severity: AlertSeverity::High,
            enabled: true,
        },
        ScanRule {
            id: "rule-unusual-currency".to_string(),
            name: "Unusual currency".to_string(),
            kind: RuleKind::Pattern,
            definition: serde_json::json!({"pattern": "unusual_currency"}),
            severity: AlertSeverity::Low,
            enabled: true,
        },
        ScanRule {
            id: "rule-velocity-large".to_string(),
            name: "Repeated large transfers".to_string(),
            kind: RuleKind::Velocity,
            definition: serde_json::json!({"pattern": "multiple_large"}),
            severity: AlertSeverity::Medium,
            enabled: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn txn(amount: f64, currency: &str, from: &str, to: &str, kind: &str) -> TransactionRecord {
        TransactionRecord {
            id: "txn-1".to_string(),
            amount,
            currency: currency.to_string(),
            from_account: from.to_string(),
            to_account: to.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn threshold_rule_compares_amount() {
        let rule = ScanRule {
            id: "r1".into(),
            name: "big".into(),
            kind: RuleKind::Threshold,
            definition: json!({"amount_over": 10_000.0}),
            severity: AlertSeverity::High,
            enabled: true,
        };
        assert!(evaluate_rule(&rule, &txn(15_000.0, "USD", "a", "b", "domestic")));
        assert!(!evaluate_rule(&rule, &txn(10_000.0, "USD", "a", "b", "domestic")));
    }

    #[test]
    fn pattern_rules_match_reference_semantics() {
        let rules = default_rules();
        // Self transfer
        let alerts = scan_transaction(&rules, &txn(100.0, "USD", "acct", "acct", "domestic"));
        assert!(alerts.iter().any(|a| a.rule_id == "rule-self-transfer"));

        // International high value also trips the velocity band
        let alerts = scan_transaction(&rules, &txn(6_000.0, "USD", "a", "b", "international"));
        let ids: Vec<&str> = alerts.iter().map(|a| a.rule_id.as_str()).collect();
        assert!(ids.contains(&"rule-intl-high-value"));
        assert!(ids.contains(&"rule-velocity-large"));

        // Unusual currency needs > 1000 in non-USD
        let alerts = scan_transaction(&rules, &txn(2_000.0, "EUR", "a", "b", "domestic"));
        assert!(alerts.iter().any(|a| a.rule_id == "rule-unusual-currency"));
        let alerts = scan_transaction(&rules, &txn(500.0, "EUR", "a", "b", "domestic"));
        assert!(alerts.is_empty());
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut rules = default_rules();
        for rule in &mut rules {
            rule.enabled = false;
        }
        let alerts = scan_transaction(&rules, &txn(50_000.0, "EUR", "acct", "acct", "international"));
        assert!(alerts.is_empty());
    }

    #[test]
    fn risk_levels_band_correctly() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.85), RiskLevel::Critical);
    }

    #[test]
    fn batch_risk_score_is_severity_weighted() {
        let alerts = vec![
            FraudAlert {
                transaction_id: "t1".into(),
                rule_id: "r".into(),
                rule_name: "r".into(),
                severity: AlertSeverity::Critical,
                message: String::new(),
            },
            FraudAlert {
                transaction_id: "t2".into(),
                rule_id: "r".into(),
                rule_name: "r".into(),
                severity: AlertSeverity::Low,
                message: String::new(),
            },
        ];
        // (1.0 + 0.25) / 10
        assert!((batch_risk_score(10, &alerts) - 0.125).abs() < 1e-9);
        assert_eq!(batch_risk_score(0, &alerts), 0.0);
        // Capped at 1.0
        assert_eq!(batch_risk_score(1, &alerts), 1.0);
    }
}
