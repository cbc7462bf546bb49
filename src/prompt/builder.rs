//! Instruction text for the two interpretation modes.
//!
//! Both modes share the system prompt and the reply schema; they differ in
//! the task section. Refinement embeds the prior record verbatim and spells
//! out how each kind of modification must be applied.

use crate::domain::{MealRequest, NutritionRecord};
use crate::llm::CompletionRequest;

/// System prompt shared by both modes
pub const SYSTEM_PROMPT: &str = "You are a registered dietitian who converts meal descriptions into \
structured nutrition data. You reply with a single JSON object and nothing else: no prose, no \
markdown, no code fences.";

const REPLY_SCHEMA: &str = r#"## Reply Format

Respond with ONLY a JSON object of this exact shape:

{
  "items": [
    {
      "food": "<food name>",
      "quantity": "<amount with unit, e.g. 1 cup>",
      "macros": { "calories": <number>, "protein": <number>, "carbs": <number>, "fat": <number> }
    }
  ],
  "totals": { "calories": <number>, "protein": <number>, "carbs": <number>, "fat": <number> }
}

Rules:
- calories are kcal; protein, carbs and fat are grams
- every number is a plain JSON number >= 0, never a string or a range
- "items" has at least one entry
- "totals" is the sum of every item's macros
"#;

const DELTA_RULES: &str = r#"Apply the modification as follows:
- A bare count or multiplier ("I had 3", "3 of those", "x2") multiplies EVERY item's macros by that factor and updates each quantity to match.
- "half" or "50%" multiplies every item by 0.5.
- "double" or "twice" multiplies every item by 2.
- "add X" keeps every existing item unchanged and appends one new item for X, estimated independently.
- "remove X" or "without X" deletes the item matching X and leaves the others unchanged.
- Any other change affects only the items it names.
Items the modification does not affect must be returned exactly as they are."#;

/// A rendered instruction ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct MealPrompt {
    pub system: String,
    pub user: String,
}

impl MealPrompt {
    /// Build the instruction for `request`
    pub fn for_request(request: &MealRequest) -> Result<Self, serde_json::Error> {
        let user = match request {
            MealRequest::NewMeal { description } => new_meal_instruction(description),
            MealRequest::RefineMeal { description, prior } => refine_instruction(description, prior)?,
        };

        Ok(Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
        })
    }

    /// Convert into a provider-neutral completion request
    pub fn into_completion_request(self, max_tokens: u32, temperature: Option<f32>) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.system)
            .with_user_message(self.user)
            .with_max_tokens(max_tokens);
        if let Some(t) = temperature {
            request = request.with_temperature(t);
        }
        request
    }
}

fn new_meal_instruction(description: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Meal\n\n");
    prompt.push_str(description.trim());
    prompt.push_str("\n\n");

    prompt.push_str("## Task\n\n");
    prompt.push_str("Estimate the nutrition of this meal. List each distinct food as its own item, in the order ");
    prompt.push_str("mentioned. When an amount is not stated, assume a standard serving size and say so in the ");
    prompt.push_str("quantity.\n\n");

    prompt.push_str(REPLY_SCHEMA);
    prompt
}

fn refine_instruction(description: &str, prior: &NutritionRecord) -> Result<String, serde_json::Error> {
    let record_json = serde_json::to_string_pretty(prior)?;
    let mut prompt = String::new();

    prompt.push_str("## Current Record\n\n");
    prompt.push_str("This record is ground truth for what was eaten so far:\n\n");
    prompt.push_str(&record_json);
    prompt.push_str("\n\n");

    prompt.push_str("## Modification\n\n");
    prompt.push_str(description.trim());
    prompt.push_str("\n\n");

    prompt.push_str("## Task\n\n");
    prompt.push_str("The modification is a change to the current record, NOT a new meal. Do not re-estimate ");
    prompt.push_str("the meal from scratch. Return the complete updated record.\n\n");
    prompt.push_str(DELTA_RULES);
    prompt.push_str("\n\n");

    prompt.push_str(REPLY_SCHEMA);
    Ok(prompt)
}
