//! Prompt System - instruction text sent to the model
//!
//! One builder, two modes: estimating a new meal and refining a prior record.

mod builder;

pub use builder::{MealPrompt, SYSTEM_PROMPT};
