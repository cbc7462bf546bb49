//! Nutrition record types.
//!
//! A `NutritionRecord` is built fresh on every interpretation and never
//! mutated afterwards; refinement produces a new record.

use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Calories (kcal) and macronutrients (grams).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    /// Field name and value pairs, in wire order
    pub fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ]
    }

    /// Multiply every field by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    /// Largest per-field relative difference from `reference`.
    ///
    /// Differences are measured against `max(|reference|, 1.0)` so that
    /// near-zero fields do not blow up the ratio.
    pub fn max_relative_drift(&self, reference: &Macros) -> f64 {
        self.fields()
            .iter()
            .zip(reference.fields().iter())
            .map(|((_, actual), (_, expected))| (actual - expected).abs() / expected.abs().max(1.0))
            .fold(0.0, f64::max)
    }

    /// Name of the first field that is negative or not finite
    pub fn first_invalid_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
            .map(|(name, _)| name)
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sum for Macros {
    fn sum<I: Iterator<Item = Macros>>(iter: I) -> Macros {
        iter.fold(Macros::default(), Add::add)
    }
}

impl<'a> Sum<&'a Macros> for Macros {
    fn sum<I: Iterator<Item = &'a Macros>>(iter: I) -> Macros {
        iter.copied().sum()
    }
}

/// One food in a meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    /// Human-readable name, never empty
    pub food: String,

    /// Amount descriptor such as "1 cup" or "2 slices"
    pub quantity: String,

    pub macros: Macros,
}

impl FoodItem {
    pub fn new(food: impl Into<String>, quantity: impl Into<String>, macros: Macros) -> Self {
        Self {
            food: food.into(),
            quantity: quantity.into(),
            macros,
        }
    }
}

/// Itemized foods plus their aggregate totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub items: Vec<FoodItem>,
    pub totals: Macros,
}

impl NutritionRecord {
    /// Build a record whose totals are the sum of `items`
    pub fn from_items(items: Vec<FoodItem>) -> Self {
        let totals = items.iter().map(|item| &item.macros).sum();
        Self { items, totals }
    }

    /// Sum of every item's macros
    pub fn item_sum(&self) -> Macros {
        self.items.iter().map(|item| &item.macros).sum()
    }

    /// Return a copy with totals recomputed from the items
    pub fn reconciled(&self) -> Self {
        Self::from_items(self.items.clone())
    }

    /// Relative drift between the stated totals and the item sum
    pub fn totals_drift(&self) -> f64 {
        self.totals.max_relative_drift(&self.item_sum())
    }

    /// Check the structural invariants, describing the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("record has no items".to_string());
        }

        for (i, item) in self.items.iter().enumerate() {
            if item.food.trim().is_empty() {
                return Err(format!("items[{}].food is empty", i));
            }
            if let Some(field) = item.macros.first_invalid_field() {
                return Err(format!("items[{}].macros.{} must be a finite number >= 0", i, field));
            }
        }

        if let Some(field) = self.totals.first_invalid_field() {
            return Err(format!("totals.{} must be a finite number >= 0", field));
        }

        Ok(())
    }
}
