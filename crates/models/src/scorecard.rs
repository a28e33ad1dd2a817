use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// Structured result of a review-mode completion.
///
/// Deserialization is strict about types (a score given as `"7"` is
/// rejected) and every field is required; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Scorecard {
    #[validate(range(min = 0.0, max = 10.0))]
    pub overall_score: f64,

    #[validate(length(min = 1, max = 2000))]
    pub summary: String,

    #[validate(length(min = 1, max = 20), nested)]
    pub criteria: Vec<CriterionScore>,

    pub strengths: Vec<String>,

    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CriterionScore {
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    #[validate(range(min = 0.0, max = 10.0))]
    pub score: f64,

    pub comment: String,
}
