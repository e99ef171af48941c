//! Multi-criteria decision analysis
//!
//! Ranks a set of alternatives scored against weighted benefit/cost
//! criteria. Seven methods are supported, from the plain weighted-sum
//! model up to TOPSIS and VIKOR compromise ranking, plus a weight
//! perturbation sensitivity pass over the final ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Errors from decision analysis
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),
    #[error("Invalid weight for criterion '{0}': must be positive")]
    InvalidWeight(String),
    #[error("Alternative '{alternative}' has non-positive score for '{criterion}'")]
    NonPositiveScore {
        alternative: String,
        criterion: String,
    },
    #[error("Unknown MCDA method: {0}")]
    UnknownMethod(String),
}

/// Whether a higher score on a criterion is desirable or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Benefit,
    Cost,
}

/// A single evaluation criterion with its relative weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: CriterionKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_kind() -> CriterionKind {
    CriterionKind::Benefit
}

fn default_weight() -> f64 {
    1.0
}

/// A decision alternative with raw scores per criterion id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub id: String,
    pub name: String,
    pub scores: HashMap<String, f64>,
}

/// Supported MCDA methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McdaMethod {
    WeightedSum,
    WeightedProduct,
    Topsis,
    Electre,
    Promethee,
    Ahp,
    Vikor,
}

impl McdaMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedSum => "weighted_sum",
            Self::WeightedProduct => "weighted_product",
            Self::Topsis => "topsis",
            Self::Electre => "electre",
            Self::Promethee => "promethee",
            Self::Ahp => "ahp",
            Self::Vikor => "vikor",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DecisionError> {
        match s.to_lowercase().as_str() {
            "weighted_sum" => Ok(Self::WeightedSum),
            "weighted_product" => Ok(Self::WeightedProduct),
            "topsis" => Ok(Self::Topsis),
            "electre" => Ok(Self::Electre),
            "promethee" => Ok(Self::Promethee),
            "ahp" => Ok(Self::Ahp),
            "vikor" => Ok(Self::Vikor),
            other => Err(DecisionError::UnknownMethod(other.to_string())),
        }
    }
}

/// Tunable method parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McdaConfig {
    /// p-norm used for TOPSIS separation measures
    pub topsis_distance_p: f64,
    /// Concordance threshold for ELECTRE
    pub electre_threshold: f64,
    /// Minimum score difference that counts as a preference in PROMETHEE
    pub promethee_preference_threshold: f64,
    /// VIKOR `v`: weight of group utility vs individual regret
    pub vikor_strategy_weight: f64,
}

impl Default for McdaConfig {
    fn default() -> Self {
        Self {
            topsis_distance_p: 2.0,
            electre_threshold: 0.7,
            promethee_preference_threshold: 0.1,
            vikor_strategy_weight: 0.5,
        }
    }
}

/// Result of a completed decision analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionAnalysis {
    pub analysis_id: Uuid,
    pub problem: String,
    pub method: McdaMethod,
    /// Final score per alternative id (higher is better for every method)
    pub scores: HashMap<String, f64>,
    /// Alternative ids ordered best-first
    pub ranking: Vec<String>,
    pub recommended: Option<String>,
    /// Per-criterion ranking instability under +/-20% weight perturbation
    pub sensitivity: HashMap<String, f64>,
    pub analyzed_at: DateTime<Utc>,
}

/// Run a full analysis: score, rank, and measure weight sensitivity.
pub fn analyze(
    problem: &str,
    alternatives: &[Alternative],
    criteria: &[Criterion],
    method: McdaMethod,
    config: &McdaConfig,
) -> Result<DecisionAnalysis, DecisionError> {
    validate(alternatives, criteria)?;

    let scores = score(alternatives, criteria, method, config)?;
    let ranking = rank(&scores);
    let sensitivity = weight_sensitivity(alternatives, criteria, method, config, &ranking)?;

    tracing::debug!(
        method = method.as_str(),
        alternatives = alternatives.len(),
        criteria = criteria.len(),
        "decision analysis complete"
    );

    Ok(DecisionAnalysis {
        analysis_id: Uuid::new_v4(),
        problem: problem.to_string(),
        method,
        recommended: ranking.first().cloned(),
        scores,
        ranking,
        sensitivity,
        analyzed_at: Utc::now(),
    })
}

fn validate(alternatives: &[Alternative], criteria: &[Criterion]) -> Result<(), DecisionError> {
    if alternatives.is_empty() {
        return Err(DecisionError::EmptyInput("alternatives"));
    }
    if criteria.is_empty() {
        return Err(DecisionError::EmptyInput("criteria"));
    }
    for c in criteria {
        if c.weight <= 0.0 || !c.weight.is_finite() {
            return Err(DecisionError::InvalidWeight(c.id.clone()));
        }
    }
    Ok(())
}

/// Score alternatives with the given method. All methods return
/// higher-is-better scores so a single ranking rule applies.
pub fn score(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    method: McdaMethod,
    config: &McdaConfig,
) -> Result<HashMap<String, f64>, DecisionError> {
    let weights = normalize_weights(criteria);
    match method {
        McdaMethod::WeightedSum | McdaMethod::Ahp => {
            // AHP degenerates to the weighted-sum model when weights come in
            // pre-elicited instead of from a pairwise matrix.
            let matrix = normalized_matrix(alternatives, criteria);
            Ok(weighted_sum(alternatives, criteria, &matrix, &weights))
        }
        McdaMethod::WeightedProduct => weighted_product(alternatives, criteria, &weights),
        McdaMethod::Topsis => Ok(topsis(alternatives, criteria, &weights, config)),
        McdaMethod::Electre => {
            let matrix = normalized_matrix(alternatives, criteria);
            Ok(electre(alternatives, criteria, &matrix, &weights, config))
        }
        McdaMethod::Promethee => Ok(promethee(alternatives, criteria, &weights, config)),
        McdaMethod::Vikor => Ok(vikor(alternatives, criteria, &weights, config)),
    }
}

/// Order alternative ids by descending score, ties broken by id so the
/// ranking is deterministic.
pub fn rank(scores: &HashMap<String, f64>) -> Vec<String> {
    let mut ids: Vec<&String> = scores.keys().collect();
    ids.sort_by(|a, b| {
        let sa = scores[*a];
        let sb = scores[*b];
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
    ids.into_iter().cloned().collect()
}

/// Normalize criterion weights to sum to 1.0
pub fn normalize_weights(criteria: &[Criterion]) -> HashMap<String, f64> {
    let total: f64 = criteria.iter().map(|c| c.weight).sum();
    criteria
        .iter()
        .map(|c| (c.id.clone(), c.weight / total))
        .collect()
}

fn raw_score(alt: &Alternative, criterion: &Criterion) -> f64 {
    alt.scores.get(&criterion.id).copied().unwrap_or(0.0)
}

/// Min-max normalization per criterion column, cost criteria inverted so
/// that 1.0 is always the most desirable value. A degenerate column (all
/// values equal) normalizes to 0.5 for every alternative.
fn normalized_matrix(alternatives: &[Alternative], criteria: &[Criterion]) -> Vec<Vec<f64>> {
    let mut matrix = vec![vec![0.0; criteria.len()]; alternatives.len()];
    for (j, criterion) in criteria.iter().enumerate() {
        let column: Vec<f64> = alternatives.iter().map(|a| raw_score(a, criterion)).collect();
        let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        for (i, value) in column.iter().enumerate() {
            let normalized = if range > 0.0 { (value - min) / range } else { 0.5 };
            matrix[i][j] = match criterion.kind {
                CriterionKind::Benefit => normalized,
                CriterionKind::Cost => 1.0 - normalized,
            };
        }
    }
    matrix
}

fn weighted_sum(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    matrix: &[Vec<f64>],
    weights: &HashMap<String, f64>,
) -> HashMap<String, f64> {
    alternatives
        .iter()
        .enumerate()
        .map(|(i, alt)| {
            let score: f64 = criteria
                .iter()
                .enumerate()
                .map(|(j, c)| matrix[i][j] * weights[&c.id])
                .sum();
            (alt.id.clone(), score)
        })
        .collect()
}

fn weighted_product(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    weights: &HashMap<String, f64>,
) -> Result<HashMap<String, f64>, DecisionError> {
    let mut scores = HashMap::new();
    for alt in alternatives {
        let mut product = 1.0_f64;
        for criterion in criteria {
            let value = raw_score(alt, criterion);
            if value <= 0.0 {
                return Err(DecisionError::NonPositiveScore {
                    alternative: alt.id.clone(),
                    criterion: criterion.id.clone(),
                });
            }
            let w = weights[&criterion.id];
            let exponent = match criterion.kind {
                CriterionKind::Benefit => w,
                CriterionKind::Cost => -w,
            };
            product *= value.powf(exponent);
        }
        scores.insert(alt.id.clone(), product);
    }
    Ok(scores)
}

fn topsis(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    weights: &HashMap<String, f64>,
    config: &McdaConfig,
) -> HashMap<String, f64> {
    let n = alternatives.len();
    let m = criteria.len();
    let p = config.topsis_distance_p;

    // Vector normalization, then weighting
    let mut matrix = vec![vec![0.0; m]; n];
    for (j, criterion) in criteria.iter().enumerate() {
        let norm: f64 = alternatives
            .iter()
            .map(|a| raw_score(a, criterion).powi(2))
            .sum::<f64>()
            .sqrt();
        for (i, alt) in alternatives.iter().enumerate() {
            let v = if norm > 0.0 { raw_score(alt, criterion) / norm } else { 0.0 };
            matrix[i][j] = v * weights[&criterion.id];
        }
    }

    // Ideal / anti-ideal per column, direction depends on criterion kind
    let mut ideal = vec![0.0; m];
    let mut anti_ideal = vec![0.0; m];
    for (j, criterion) in criteria.iter().enumerate() {
        let column: Vec<f64> = (0..n).map(|i| matrix[i][j]).collect();
        let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
        match criterion.kind {
            CriterionKind::Benefit => {
                ideal[j] = max;
                anti_ideal[j] = min;
            }
            CriterionKind::Cost => {
                ideal[j] = min;
                anti_ideal[j] = max;
            }
        }
    }

    let mut scores = HashMap::new();
    for (i, alt) in alternatives.iter().enumerate() {
        let mut d_ideal = 0.0;
        let mut d_anti = 0.0;
        for j in 0..m {
            d_ideal += (matrix[i][j] - ideal[j]).abs().powf(p);
            d_anti += (matrix[i][j] - anti_ideal[j]).abs().powf(p);
        }
        d_ideal = d_ideal.powf(1.0 / p);
        d_anti = d_anti.powf(1.0 / p);
        let denom = d_ideal + d_anti;
        let closeness = if denom > 0.0 { d_anti / denom } else { 0.5 };
        scores.insert(alt.id.clone(), closeness);
    }
    scores
}

fn electre(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    matrix: &[Vec<f64>],
    weights: &HashMap<String, f64>,
    config: &McdaConfig,
) -> HashMap<String, f64> {
    // Simplified concordance scoring: an alternative collects a criterion's
    // weight whenever its normalized score clears the concordance threshold.
    alternatives
        .iter()
        .enumerate()
        .map(|(i, alt)| {
            let mut score = 0.0;
            for (j, criterion) in criteria.iter().enumerate() {
                if matrix[i][j] >= config.electre_threshold {
                    score += weights[&criterion.id];
                }
            }
            (alt.id.clone(), score)
        })
        .collect()
}

fn promethee(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    weights: &HashMap<String, f64>,
    config: &McdaConfig,
) -> HashMap<String, f64> {
    // Pairwise outranking flows over raw scores: alternative a is preferred
    // to b on a criterion when its advantage exceeds the preference
    // threshold (direction flipped for cost criteria).
    let mut scores = HashMap::new();
    for a in alternatives {
        let mut positive_flow = 0.0;
        let mut negative_flow = 0.0;
        for b in alternatives {
            if a.id == b.id {
                continue;
            }
            let mut a_over_b = 0.0;
            let mut b_over_a = 0.0;
            for criterion in criteria {
                let diff = match criterion.kind {
                    CriterionKind::Benefit => raw_score(a, criterion) - raw_score(b, criterion),
                    CriterionKind::Cost => raw_score(b, criterion) - raw_score(a, criterion),
                };
                if diff > config.promethee_preference_threshold {
                    a_over_b += weights[&criterion.id];
                } else if -diff > config.promethee_preference_threshold {
                    b_over_a += weights[&criterion.id];
                }
            }
            positive_flow += a_over_b;
            negative_flow += b_over_a;
        }
        scores.insert(a.id.clone(), positive_flow - negative_flow);
    }
    scores
}

fn vikor(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    weights: &HashMap<String, f64>,
    config: &McdaConfig,
) -> HashMap<String, f64> {
    // Best/worst value per criterion, honoring direction
    let mut best = HashMap::new();
    let mut worst = HashMap::new();
    for criterion in criteria {
        let column: Vec<f64> = alternatives.iter().map(|a| raw_score(a, criterion)).collect();
        let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
        match criterion.kind {
            CriterionKind::Benefit => {
                best.insert(criterion.id.clone(), max);
                worst.insert(criterion.id.clone(), min);
            }
            CriterionKind::Cost => {
                best.insert(criterion.id.clone(), min);
                worst.insert(criterion.id.clone(), max);
            }
        }
    }

    let v = config.vikor_strategy_weight;
    let mut scores = HashMap::new();
    for alt in alternatives {
        let mut s = 0.0; // group utility
        let mut r = 0.0_f64; // individual regret
        for criterion in criteria {
            let b = best[&criterion.id];
            let w = worst[&criterion.id];
            if (b - w).abs() > f64::EPSILON {
                let normalized = (b - raw_score(alt, criterion)) / (b - w);
                let weighted = weights[&criterion.id] * normalized.abs();
                s += weighted;
                r = r.max(weighted);
            }
        }
        let q = v * s + (1.0 - v) * r;
        // Stored as 1 - Q so that descending ranking holds for every method
        scores.insert(alt.id.clone(), 1.0 - q);
    }
    scores
}

/// Perturb each criterion weight by +/-20% and measure how much of the
/// ranking moves. 0.0 means the ranking is stable against that criterion,
/// 1.0 means every position changed under perturbation.
fn weight_sensitivity(
    alternatives: &[Alternative],
    criteria: &[Criterion],
    method: McdaMethod,
    config: &McdaConfig,
    baseline: &[String],
) -> Result<HashMap<String, f64>, DecisionError> {
    let mut sensitivity = HashMap::new();
    if alternatives.len() < 2 {
        for c in criteria {
            sensitivity.insert(c.id.clone(), 0.0);
        }
        return Ok(sensitivity);
    }

    for (idx, criterion) in criteria.iter().enumerate() {
        let mut displaced = 0.0;
        for factor in [0.8, 1.2] {
            let mut perturbed = criteria.to_vec();
            perturbed[idx].weight = criterion.weight * factor;
            let scores = score(alternatives, &perturbed, method, config)?;
            let ranking = rank(&scores);
            let moved = baseline
                .iter()
                .zip(&ranking)
                .filter(|(a, b)| a != b)
                .count();
            displaced += moved as f64 / baseline.len() as f64;
        }
        sensitivity.insert(criterion.id.clone(), displaced / 2.0);
    }
    Ok(sensitivity)
}

/// Consistency ratio for an AHP pairwise comparison matrix. Values below
/// 0.1 are conventionally acceptable.
pub fn consistency_ratio(pairwise: &[Vec<f64>]) -> Option<f64> {
    let n = pairwise.len();
    if n < 3 || pairwise.iter().any(|row| row.len() != n) {
        return None;
    }

    // Principal eigenvector approximation via row geometric means
    let mut priorities: Vec<f64> = pairwise
        .iter()
        .map(|row| row.iter().product::<f64>().powf(1.0 / n as f64))
        .collect();
    let total: f64 = priorities.iter().sum();
    for p in &mut priorities {
        *p /= total;
    }

    // lambda_max estimate
    let mut lambda = 0.0;
    for (i, row) in pairwise.iter().enumerate() {
        let weighted_sum: f64 = row.iter().zip(&priorities).map(|(a, p)| a * p).sum();
        lambda += weighted_sum / priorities[i];
    }
    let lambda_max = lambda / n as f64;

    // Saaty random index table
    const RI: [f64; 11] = [0.0, 0.0, 0.0, 0.58, 0.9, 1.12, 1.24, 1.32, 1.41, 1.45, 1.49];
    let ri = RI.get(n).copied().unwrap_or(1.49);
    if ri == 0.0 {
        return Some(0.0);
    }
    let ci = (lambda_max - n as f64) / (n as f64 - 1.0);
    Some(ci / ri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion {
                id: "accuracy".into(),
                name: "Detection accuracy".into(),
                kind: CriterionKind::Benefit,
                weight: 0.6,
            },
            Criterion {
                id: "cost".into(),
                name: "Operating cost".into(),
                kind: CriterionKind::Cost,
                weight: 0.4,
            },
        ]
    }

    fn alt(id: &str, accuracy: f64, cost: f64) -> Alternative {
        let mut scores = HashMap::new();
        scores.insert("accuracy".to_string(), accuracy);
        scores.insert("cost".to_string(), cost);
        Alternative {
            id: id.to_string(),
            name: id.to_string(),
            scores,
        }
    }

    #[test]
    fn weighted_sum_prefers_dominant_alternative() {
        // "good" dominates: higher accuracy, lower cost
        let alternatives = vec![alt("good", 0.9, 10.0), alt("bad", 0.5, 90.0)];
        let analysis = analyze(
            "pick a model",
            &alternatives,
            &criteria(),
            McdaMethod::WeightedSum,
            &McdaConfig::default(),
        )
        .unwrap();

        assert_eq!(analysis.ranking[0], "good");
        assert_eq!(analysis.recommended.as_deref(), Some("good"));
        assert!(analysis.scores["good"] > analysis.scores["bad"]);
    }

    #[test]
    fn topsis_closeness_bounds() {
        let alternatives = vec![alt("a", 0.9, 10.0), alt("b", 0.7, 40.0), alt("c", 0.5, 90.0)];
        let scores = score(
            &alternatives,
            &criteria(),
            McdaMethod::Topsis,
            &McdaConfig::default(),
        )
        .unwrap();

        for value in scores.values() {
            assert!((0.0..=1.0).contains(value));
        }
        // The dominant alternative coincides with the ideal point
        assert!((scores["a"] - 1.0).abs() < 1e-9);
        assert!(scores["c"].abs() < 1e-9);
    }

    #[test]
    fn vikor_ranks_compromise_best_first() {
        let alternatives = vec![alt("a", 0.9, 10.0), alt("b", 0.6, 50.0), alt("c", 0.4, 95.0)];
        let analysis = analyze(
            "vikor",
            &alternatives,
            &criteria(),
            McdaMethod::Vikor,
            &McdaConfig::default(),
        )
        .unwrap();
        assert_eq!(analysis.ranking, vec!["a", "b", "c"]);
    }

    #[test]
    fn weighted_product_rejects_zero_scores() {
        let alternatives = vec![alt("a", 0.0, 10.0)];
        let err = score(
            &alternatives,
            &criteria(),
            McdaMethod::WeightedProduct,
            &McdaConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecisionError::NonPositiveScore { .. }));
    }

    #[test]
    fn promethee_net_flow_is_zero_sum() {
        let alternatives = vec![alt("a", 0.9, 10.0), alt("b", 0.7, 40.0), alt("c", 0.5, 90.0)];
        let scores = score(
            &alternatives,
            &criteria(),
            McdaMethod::Promethee,
            &McdaConfig::default(),
        )
        .unwrap();
        let total: f64 = scores.values().sum();
        assert!(total.abs() < 1e-9);
        assert!(scores["a"] > scores["c"]);
    }

    #[test]
    fn single_alternative_is_recommended_with_zero_sensitivity() {
        let alternatives = vec![alt("only", 0.8, 20.0)];
        let analysis = analyze(
            "one option",
            &alternatives,
            &criteria(),
            McdaMethod::Topsis,
            &McdaConfig::default(),
        )
        .unwrap();
        assert_eq!(analysis.recommended.as_deref(), Some("only"));
        assert!(analysis.sensitivity.values().all(|v| *v == 0.0));
    }

    #[test]
    fn equal_scores_do_not_panic() {
        let alternatives = vec![alt("a", 0.5, 50.0), alt("b", 0.5, 50.0)];
        for method in [
            McdaMethod::WeightedSum,
            McdaMethod::Topsis,
            McdaMethod::Electre,
            McdaMethod::Promethee,
            McdaMethod::Vikor,
        ] {
            let analysis = analyze(
                "ties",
                &alternatives,
                &criteria(),
                method,
                &McdaConfig::default(),
            )
            .unwrap();
            // Deterministic tie-break by id
            assert_eq!(analysis.ranking, vec!["a", "b"], "method {:?}", method);
        }
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let err = analyze(
            "nothing",
            &[],
            &criteria(),
            McdaMethod::WeightedSum,
            &McdaConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecisionError::EmptyInput("alternatives")));
    }

    #[test]
    fn method_string_round_trip() {
        for method in [
            McdaMethod::WeightedSum,
            McdaMethod::WeightedProduct,
            McdaMethod::Topsis,
            McdaMethod::Electre,
            McdaMethod::Promethee,
            McdaMethod::Ahp,
            McdaMethod::Vikor,
        ] {
            assert_eq!(McdaMethod::parse(method.as_str()).unwrap(), method);
        }
        assert!(McdaMethod::parse("saw").is_err());
    }

    #[test]
    fn consistency_ratio_of_consistent_matrix_is_low() {
        // Perfectly consistent 3x3 matrix (weights 0.5 : 0.333 : 0.167)
        let matrix = vec![
            vec![1.0, 1.5, 3.0],
            vec![1.0 / 1.5, 1.0, 2.0],
            vec![1.0 / 3.0, 0.5, 1.0],
        ];
        let cr = consistency_ratio(&matrix).unwrap();
        assert!(cr < 0.01, "cr = {}", cr);
    }
}
