use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A normalized ingredient name tracked with a usage counter across the whole
/// catalog. `count` is the number of raw observations, one per occurrence in
/// every ingested or updated record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIngredient {
    pub name: String,
    pub count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Ingredients posted to the vocabulary endpoint arrive either as bare
/// strings or as `{ "name": ... }` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngredientInput {
    Name(String),
    Entry { name: String },
}

impl IngredientInput {
    pub fn into_name(self) -> String {
        match self {
            IngredientInput::Name(name) => name,
            IngredientInput::Entry { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TopIngredientsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchIngredientsQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddIngredientsResponse {
    pub message: String,
    pub added: usize,
    pub total: usize,
}
