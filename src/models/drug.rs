use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A persisted drug registration record. Field names mirror the Vietnamese
/// drug-price registration sheets the catalog is built from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DrugRecord {
    pub id: Uuid,
    pub registration_number: String,
    pub name: Option<String>,
    /// Raw, unprocessed active-ingredient text as it appears on the sheet.
    pub ingredients: Option<String>,
    /// Derived by the normalizer; empty when no raw text was supplied.
    pub cleaned_ingredients: Vec<String>,
    pub manufacturing_requirements: Option<String>,
    pub unit_of_measure: Option<String>,
    pub estimated_price: Option<f64>,
    pub manufacturer: Option<String>,
    pub distributor: Option<String>,
    pub year_of_registration: Option<String>,
    pub country_of_origin: Option<String>,
    pub usage_form: Option<String>,
    pub content_of_review: Option<String>,
    pub no_proposals_on_price: Option<String>,
    pub date_of_proposals_on_price: Option<String>,
    pub additional_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An incoming drug record, as produced by a client batch upload or by the
/// PDF extraction adapter. The identifier is optional: records parsed out of
/// PDFs arrive without one and the store assigns it on insert.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RawDrugRecord {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, message = "Registration number is required"))]
    pub registration_number: String,
    pub name: Option<String>,
    pub ingredients: Option<String>,
    pub manufacturing_requirements: Option<String>,
    pub unit_of_measure: Option<String>,
    pub estimated_price: Option<f64>,
    pub manufacturer: Option<String>,
    pub distributor: Option<String>,
    pub year_of_registration: Option<String>,
    pub country_of_origin: Option<String>,
    pub usage_form: Option<String>,
    pub content_of_review: Option<String>,
    pub no_proposals_on_price: Option<String>,
    pub date_of_proposals_on_price: Option<String>,
    pub additional_notes: Option<String>,
}

/// A raw record whose cleaned ingredient list has been computed and which is
/// ready for persistence.
#[derive(Debug, Clone)]
pub struct NewDrugRecord {
    pub id: Uuid,
    pub record: RawDrugRecord,
    pub cleaned_ingredients: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDrugRequest {
    pub registration_number: Option<String>,
    pub name: Option<String>,
    pub ingredients: Option<String>,
    pub manufacturing_requirements: Option<String>,
    pub unit_of_measure: Option<String>,
    pub estimated_price: Option<f64>,
    pub manufacturer: Option<String>,
    pub distributor: Option<String>,
    pub year_of_registration: Option<String>,
    pub country_of_origin: Option<String>,
    pub usage_form: Option<String>,
    pub content_of_review: Option<String>,
    pub no_proposals_on_price: Option<String>,
    pub date_of_proposals_on_price: Option<String>,
    pub additional_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub message: String,
    pub inserted_count: usize,
    pub skipped_count: usize,
}
