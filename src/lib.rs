//! macrolog - free-text meals to structured nutrition records
//!
//! A meal description ("2 eggs and toast") or a modification of a prior
//! record ("double it", "remove the toast") is turned into itemized foods
//! and aggregate macros by an external language model. This crate phrases
//! the instruction, calls the model once, and validates the reply before
//! anything reaches the caller.

pub mod domain;
pub mod error;
pub mod interpreter;
pub mod llm;
pub mod prompt;

pub use domain::{FoodItem, InterpretRequest, InterpretResponse, Macros, MealRequest, NutritionRecord};
pub use error::{ErrorKind, InterpretError, Result};
pub use interpreter::{InterpreterOptions, MealInterpreter, extract_record};
