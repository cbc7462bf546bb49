//! Domain types for macrolog
//!
//! - NutritionRecord, FoodItem, Macros: the structured result of an interpretation
//! - MealRequest: new meal or refinement of a prior record
//! - InterpretRequest / InterpretResponse: the JSON envelopes seen by the application layer

pub mod envelope;
pub mod record;
pub mod request;

pub use envelope::{ErrorBody, InterpretRequest, InterpretResponse};
pub use record::{FoodItem, Macros, NutritionRecord};
pub use request::MealRequest;
