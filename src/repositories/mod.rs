pub mod drug_repo;
pub mod ingredient_repo;

pub use drug_repo::DrugRepository;
pub use ingredient_repo::IngredientRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::drug::{DrugRecord, NewDrugRecord, UpdateDrugRequest};
use crate::models::ingredient::CanonicalIngredient;

/// Persistence boundary for the drug catalog. The service layer only sees
/// this trait; the Postgres implementation lives in `drug_repo`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the subset of `ids` that already exist in the catalog.
    async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Inserts a batch atomically; either every record lands or none do.
    async fn bulk_insert(&self, records: Vec<NewDrugRecord>) -> Result<Vec<DrugRecord>>;

    async fn count(&self) -> Result<i64>;

    async fn list(&self, page: i64, limit: i64) -> Result<Vec<DrugRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DrugRecord>>;

    /// Applies a partial update. `cleaned_ingredients` is supplied by the
    /// caller whenever the raw ingredient text changed.
    async fn update(
        &self,
        id: Uuid,
        update: &UpdateDrugRequest,
        cleaned_ingredients: Option<&[String]>,
    ) -> Result<Option<DrugRecord>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Persistence boundary for the shared ingredient vocabulary. Both mutation
/// primitives must be atomic single-row operations: the reconciler layers no
/// locking of its own on top of them.
#[async_trait]
pub trait VocabularyStore: Send + Sync {
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<CanonicalIngredient>>;

    /// Atomic "find by exact name, count += 1, last_seen = now". Returns the
    /// number of rows matched (0 when the name is unknown).
    async fn increment_count_and_touch(&self, name: &str) -> Result<u64>;

    /// Inserts a fresh entry with count = 1. Returns false when another
    /// writer created the name first; the row is never duplicated.
    async fn insert_new(&self, name: &str) -> Result<bool>;

    async fn list_sorted_by_count_desc(&self, limit: Option<i64>) -> Result<Vec<CanonicalIngredient>>;

    /// Case-insensitive substring match against the name.
    async fn search_by_pattern(&self, pattern: &str) -> Result<Vec<CanonicalIngredient>>;
}
