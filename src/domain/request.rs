//! Meal interpretation requests.

use super::record::NutritionRecord;

/// What the caller wants interpreted.
///
/// The variant decides which instruction the model receives: a fresh
/// estimate, or a delta applied to a prior record.
#[derive(Debug, Clone, PartialEq)]
pub enum MealRequest {
    /// Estimate a new meal from scratch ("2 eggs and toast")
    NewMeal { description: String },

    /// Apply a modification to a prior record ("double it", "remove the toast")
    RefineMeal {
        description: String,
        prior: NutritionRecord,
    },
}

impl MealRequest {
    pub fn new_meal(description: impl Into<String>) -> Self {
        MealRequest::NewMeal {
            description: description.into(),
        }
    }

    pub fn refine(description: impl Into<String>, prior: NutritionRecord) -> Self {
        MealRequest::RefineMeal {
            description: description.into(),
            prior,
        }
    }

    /// Map the nullable-prior form onto the two variants
    pub fn from_parts(description: impl Into<String>, existing: Option<NutritionRecord>) -> Self {
        match existing {
            Some(prior) => Self::refine(description, prior),
            None => Self::new_meal(description),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            MealRequest::NewMeal { description } => description,
            MealRequest::RefineMeal { description, .. } => description,
        }
    }

    pub fn is_refinement(&self) -> bool {
        matches!(self, MealRequest::RefineMeal { .. })
    }

    /// Short label used in log lines
    pub fn mode(&self) -> &'static str {
        match self {
            MealRequest::NewMeal { .. } => "new-meal",
            MealRequest::RefineMeal { .. } => "refine",
        }
    }
}
