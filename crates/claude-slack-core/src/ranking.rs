//! Hybrid search ranking profiles and the combined-score formula (§4.5).

use serde::{Deserialize, Serialize};

/// A named tuple `(half_life, w_sim, w_conf, w_rec)` controlling result
/// ordering (GLOSSARY: "ranking profile").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingProfile {
    /// Recency half-life, in hours.
    pub half_life_hours: f64,
    pub w_sim: f64,
    pub w_conf: f64,
    pub w_rec: f64,
}

impl RankingProfile {
    /// Recent: favors freshness. half-life 24h.
    pub const RECENT: Self = Self { half_life_hours: 24.0, w_sim: 0.30, w_conf: 0.10, w_rec: 0.60 };
    /// Quality: favors similarity and asserted confidence. half-life 30d.
    pub const QUALITY: Self = Self { half_life_hours: 30.0 * 24.0, w_sim: 0.40, w_conf: 0.50, w_rec: 0.10 };
    /// Balanced: roughly equal weight to all three signals. half-life 7d.
    pub const BALANCED: Self = Self { half_life_hours: 7.0 * 24.0, w_sim: 0.34, w_conf: 0.33, w_rec: 0.33 };
    /// Similarity: pure vector similarity, no recency/confidence. half-life 1y.
    pub const SIMILARITY: Self = Self { half_life_hours: 365.0 * 24.0, w_sim: 1.00, w_conf: 0.00, w_rec: 0.00 };

    /// Resolve a profile by name (`recent`, `quality`, `balanced`,
    /// `similarity`), case-insensitively. `None` if the name is unrecognized
    /// (callers may then fall back to a custom profile).
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "recent" => Some(Self::RECENT),
            "quality" => Some(Self::QUALITY),
            "balanced" => Some(Self::BALANCED),
            "similarity" => Some(Self::SIMILARITY),
            _ => None,
        }
    }
}

impl Default for RankingProfile {
    fn default() -> Self {
        Self::BALANCED
    }
}

/// Exponential recency decay: `2^(-age_h / half_life_h)`.
#[must_use]
pub fn decay(age_hours: f64, half_life_hours: f64) -> f64 {
    if half_life_hours <= 0.0 {
        return if age_hours <= 0.0 { 1.0 } else { 0.0 };
    }
    2f64.powf(-age_hours / half_life_hours)
}

/// One scored candidate's raw inputs.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// `1 - cosine_distance`, in `[0,1]`. `None` on the filter-only path
    /// (no query embedding to compare against).
    pub similarity: Option<f64>,
    /// Caller-asserted confidence, `[0,1]`. Missing treated as 0.5 (§4.5, §8).
    pub confidence: Option<f64>,
    /// Message age at query time, in hours.
    pub age_hours: f64,
}

/// Combined score per §4.5:
///
/// ```text
/// score = (w_sim*sim + w_conf*conf + w_rec*decay(age,half_life)) / (w_sim+w_conf+w_rec)
/// ```
///
/// A missing similarity (filter-only path) is treated as 0 contribution and
/// its weight excluded from the denominator, so filter-only results are
/// ranked purely on confidence/recency.
#[must_use]
pub fn combined_score(inputs: ScoreInputs, profile: RankingProfile) -> f64 {
    let conf = inputs.confidence.unwrap_or(0.5);
    let rec = decay(inputs.age_hours, profile.half_life_hours);

    let (sim_term, sim_weight) = match inputs.similarity {
        Some(sim) => (profile.w_sim * sim, profile.w_sim),
        None => (0.0, 0.0),
    };

    let numerator = sim_term + profile.w_conf * conf + profile.w_rec * rec;
    let denominator = sim_weight + profile.w_conf + profile.w_rec;
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_profile_favors_fresh_message() {
        // M1: age 1h, sim 0.6, conf 0.5. M2: age 240h, sim 0.9, conf 0.9.
        let m1 = ScoreInputs { similarity: Some(0.6), confidence: Some(0.5), age_hours: 1.0 };
        let m2 = ScoreInputs { similarity: Some(0.9), confidence: Some(0.9), age_hours: 240.0 };
        let s1 = combined_score(m1, RankingProfile::RECENT);
        let s2 = combined_score(m2, RankingProfile::RECENT);
        assert!(s1 > s2, "recent profile should rank M1 first: {s1} vs {s2}");
    }

    #[test]
    fn quality_profile_favors_high_confidence_similarity() {
        let m1 = ScoreInputs { similarity: Some(0.6), confidence: Some(0.5), age_hours: 1.0 };
        let m2 = ScoreInputs { similarity: Some(0.9), confidence: Some(0.9), age_hours: 240.0 };
        let s1 = combined_score(m1, RankingProfile::QUALITY);
        let s2 = combined_score(m2, RankingProfile::QUALITY);
        assert!(s2 > s1, "quality profile should rank M2 first: {s2} vs {s1}");
    }

    #[test]
    fn similarity_profile_ignores_recency_and_confidence() {
        let m1 = ScoreInputs { similarity: Some(0.6), confidence: Some(0.5), age_hours: 1.0 };
        let m2 = ScoreInputs { similarity: Some(0.9), confidence: Some(0.9), age_hours: 240.0 };
        let s1 = combined_score(m1, RankingProfile::SIMILARITY);
        let s2 = combined_score(m2, RankingProfile::SIMILARITY);
        assert!((s1 - 0.6).abs() < 1e-9);
        assert!((s2 - 0.9).abs() < 1e-9);
        assert!(s2 > s1);
    }

    #[test]
    fn missing_confidence_defaults_to_half() {
        let inputs = ScoreInputs { similarity: None, confidence: None, age_hours: 0.0 };
        let with_half = ScoreInputs { similarity: None, confidence: Some(0.5), age_hours: 0.0 };
        assert!(
            (combined_score(inputs, RankingProfile::BALANCED)
                - combined_score(with_half, RankingProfile::BALANCED))
            .abs()
                < 1e-9
        );
    }

    #[test]
    fn by_name_is_case_insensitive() {
        assert_eq!(RankingProfile::by_name("RECENT"), Some(RankingProfile::RECENT));
        assert_eq!(RankingProfile::by_name("nonsense"), None);
    }
}
