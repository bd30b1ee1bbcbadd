use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    config::AppConfig,
    middleware::error_handling::{AppError, Result},
    models::ingredient::{
        AddIngredientsResponse, CanonicalIngredient, IngredientInput, SearchIngredientsQuery,
        TopIngredientsQuery,
    },
    repositories::IngredientRepository,
    services::VocabularyService,
};

const DEFAULT_TOP_LIMIT: i64 = 20;

fn vocabulary_service(config: &AppConfig) -> VocabularyService<IngredientRepository> {
    VocabularyService::new(IngredientRepository::new(config.database_pool.clone()))
}

/// GET /api/ingredients
/// Full vocabulary, most-used first.
pub async fn list_ingredients(
    State(config): State<AppConfig>,
) -> Result<Json<Vec<CanonicalIngredient>>> {
    let ingredients = vocabulary_service(&config).list_all().await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/top?limit=
pub async fn top_ingredients(
    State(config): State<AppConfig>,
    Query(query): Query<TopIngredientsQuery>,
) -> Result<Json<Vec<CanonicalIngredient>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, 1000);
    let ingredients = vocabulary_service(&config).top(limit).await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/search?q=
pub async fn search_ingredients(
    State(config): State<AppConfig>,
    Query(query): Query<SearchIngredientsQuery>,
) -> Result<Json<Vec<CanonicalIngredient>>> {
    let pattern = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search query is required".to_string()))?;

    let ingredients = vocabulary_service(&config).search(pattern).await?;
    Ok(Json(ingredients))
}

/// POST /api/ingredients
/// Manually registers vocabulary entries. Unlike ingestion this never bumps
/// usage counters; names that already exist are left untouched.
pub async fn add_ingredients(
    State(config): State<AppConfig>,
    Json(inputs): Json<Vec<IngredientInput>>,
) -> Result<(StatusCode, Json<AddIngredientsResponse>)> {
    if inputs.is_empty() {
        return Err(AppError::BadRequest(
            "Request body must contain at least one ingredient".to_string(),
        ));
    }

    let names: Vec<String> = inputs.into_iter().map(IngredientInput::into_name).collect();
    let outcome = vocabulary_service(&config).add_ingredients(names).await?;

    let (status, message) = if outcome.added > 0 {
        (StatusCode::CREATED, "Ingredients added successfully")
    } else {
        (
            StatusCode::OK,
            "No new ingredients to add, all already exist",
        )
    };

    Ok((
        status,
        Json(AddIngredientsResponse {
            message: message.to_string(),
            added: outcome.added,
            total: outcome.total,
        }),
    ))
}
