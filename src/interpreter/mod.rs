//! Meal Interpreter - free text in, validated nutrition record out
//!
//! - extract: locate and validate the JSON record inside a raw model reply
//! - meal_interpreter: input checks, prompt dispatch, the model call, totals reconciliation

pub mod extract;
pub mod meal_interpreter;

pub use extract::{ExtractError, extract_record, json_candidates};
pub use meal_interpreter::{InterpreterOptions, MealInterpreter};
