use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::error_handling::{AppError, Result},
    models::drug::{DrugRecord, IngestResponse, PaginationQuery, RawDrugRecord, UpdateDrugRequest},
    repositories::{DrugRepository, IngredientRepository},
    services::{CatalogService, VocabularyService},
};

fn catalog_service(config: &AppConfig) -> CatalogService<DrugRepository, IngredientRepository> {
    CatalogService::new(
        DrugRepository::new(config.database_pool.clone()),
        VocabularyService::new(IngredientRepository::new(config.database_pool.clone())),
    )
}

/// POST /api/catalog
/// Batch-ingests drug records; duplicates and failed sub-batches are counted,
/// never fatal.
pub async fn ingest_catalog(
    State(config): State<AppConfig>,
    Json(records): Json<Vec<RawDrugRecord>>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    for record in &records {
        record.validate()?;
    }

    let stats = catalog_service(&config).ingest(records).await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            message: "Upload completed".to_string(),
            inserted_count: stats.inserted_count,
            skipped_count: stats.skipped_count,
        }),
    ))
}

/// GET /api/catalog?page=&limit=
pub async fn list_catalog(
    State(config): State<AppConfig>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<(HeaderMap, Json<Vec<DrugRecord>>)> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(25).clamp(1, 100);

    let service = catalog_service(&config);
    let total = service.count().await?;
    let drugs = service.list(page, limit).await?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Total-Count", HeaderValue::from(total));
    headers.insert(
        "Access-Control-Expose-Headers",
        HeaderValue::from_static("X-Total-Count"),
    );

    Ok((headers, Json(drugs)))
}

/// GET /api/catalog/:id
pub async fn get_drug(
    State(config): State<AppConfig>,
    Path(id): Path<Uuid>,
) -> Result<Json<DrugRecord>> {
    let drug = catalog_service(&config)
        .get_drug(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Drug not found".to_string()))?;

    Ok(Json(drug))
}

/// PUT /api/catalog/:id
/// An update that touches the raw ingredient text recomputes the cleaned
/// list and re-reconciles the vocabulary.
pub async fn update_drug(
    State(config): State<AppConfig>,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateDrugRequest>,
) -> Result<Json<DrugRecord>> {
    update.validate()?;

    let drug = catalog_service(&config)
        .update_drug(id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Drug not found".to_string()))?;

    Ok(Json(drug))
}

/// DELETE /api/catalog/:id
pub async fn delete_drug(
    State(config): State<AppConfig>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = catalog_service(&config).delete_drug(id).await?;

    if !deleted {
        return Err(AppError::NotFound("Drug not found".to_string()));
    }

    Ok(Json(json!({ "message": "Drug deleted" })))
}
