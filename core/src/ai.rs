//! Contract with the text-generation service.
//!
//! Core builds each request (prompt, response schema, temperature) and parses
//! the text that comes back. Executing the request is left to the caller so
//! that this crate stays free of any HTTP client or async runtime.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const SUGGESTION_TEMPERATURE: f32 = 0.8;
const RECIPE_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalTag {
    Bulking,
    Cutting,
}

impl GoalTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GoalTag::Bulking => "bulking",
            GoalTag::Cutting => "cutting",
        }
    }
}

impl fmt::Display for GoalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bulking" => Ok(GoalTag::Bulking),
            "cutting" => Ok(GoalTag::Cutting),
            _ => bail!("Invalid goal '{s}'. Must be one of: bulking, cutting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Suggestions,
    Recipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSuggestion {
    pub meal_name: String,
    pub description: String,
    pub calories: f64,
    pub protein: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    pub meal_name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Generated {
    Suggestions(Vec<MealSuggestion>),
    Recipe(GeneratedRecipe),
}

/// What the user sees when generation fails. The underlying cause is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("Failed to get suggestions. Please try again.")]
    Suggestions,
    #[error("Failed to generate recipe. Please try again.")]
    Recipe,
    #[error("Please enter some ingredients.")]
    EmptyIngredients,
}

impl AiError {
    #[must_use]
    pub fn failed(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Suggestions => AiError::Suggestions,
            RequestKind::Recipe => AiError::Recipe,
        }
    }
}

/// One call to the generation service, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub prompt: String,
    /// Response schema in the service's OpenAPI subset.
    pub schema: Value,
    pub temperature: f32,
}

impl GenerationRequest {
    #[must_use]
    pub fn suggestions(goal: GoalTag) -> Self {
        Self {
            kind: RequestKind::Suggestions,
            prompt: format!(
                "Provide 5 meal suggestions for someone who is {goal}. \
                 The suggestions should be high in protein. Keep descriptions brief."
            ),
            schema: suggestion_schema(),
            temperature: SUGGESTION_TEMPERATURE,
        }
    }

    /// Rejects blank input before anything is sent.
    pub fn recipe(ingredients: &str) -> Result<Self, AiError> {
        let ingredients = ingredients.trim();
        if ingredients.is_empty() {
            return Err(AiError::EmptyIngredients);
        }
        Ok(Self {
            kind: RequestKind::Recipe,
            prompt: format!(
                "Create a simple and healthy recipe using the following ingredients: {ingredients}. \
                 If the ingredients are insufficient, you can add 1-2 common pantry staples \
                 (like olive oil, salt, pepper)."
            ),
            schema: recipe_schema(),
            temperature: RECIPE_TEMPERATURE,
        })
    }

    /// Collapse the service outcome into the request's result type. Transport
    /// and parse failures both become the one generic error for this kind.
    pub fn complete(&self, outcome: anyhow::Result<String>) -> Result<Generated, AiError> {
        match outcome {
            Ok(text) => parse_response(self.kind, &text),
            Err(e) => {
                error!(kind = ?self.kind, error = %format!("{e:#}"), "generation request failed");
                Err(AiError::failed(self.kind))
            }
        }
    }
}

#[must_use]
pub fn suggestion_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "mealName": {
                    "type": "STRING",
                    "description": "The name of the meal suggestion."
                },
                "description": {
                    "type": "STRING",
                    "description": "A brief, appealing description of the meal."
                },
                "calories": {
                    "type": "NUMBER",
                    "description": "Estimated calories per serving."
                },
                "protein": {
                    "type": "NUMBER",
                    "description": "Estimated grams of protein per serving."
                }
            },
            "required": ["mealName", "description", "calories", "protein"]
        }
    })
}

#[must_use]
pub fn recipe_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "mealName": {
                "type": "STRING",
                "description": "The name of the generated recipe."
            },
            "description": {
                "type": "STRING",
                "description": "A short description of the recipe."
            },
            // Lines in this shape split cleanly into quantity, unit and name
            "ingredients": {
                "type": "ARRAY",
                "items": {
                    "type": "STRING",
                    "description": "e.g., \"1 cup of rice\" or \"200g chicken breast\""
                }
            },
            "instructions": {
                "type": "ARRAY",
                "items": {
                    "type": "STRING",
                    "description": "A single step in the recipe instructions."
                }
            }
        },
        "required": ["mealName", "description", "ingredients", "instructions"]
    })
}

/// Parse the JSON text returned for a request of `kind`.
pub fn parse_response(kind: RequestKind, text: &str) -> Result<Generated, AiError> {
    let text = text.trim();
    let parsed = match kind {
        RequestKind::Suggestions => serde_json::from_str(text).map(Generated::Suggestions),
        RequestKind::Recipe => serde_json::from_str(text).map(Generated::Recipe),
    };
    parsed.map_err(|e| {
        error!(?kind, error = %e, "generation response did not match schema");
        AiError::failed(kind)
    })
}
