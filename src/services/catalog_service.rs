//! Catalog ingestion and record maintenance.
//!
//! Ingestion is deliberately best-effort: duplicate identifiers are skipped,
//! a failing sub-batch is counted as skipped instead of aborting the call,
//! and vocabulary reconciliation runs after the insert commits and never
//! rolls it back.

use serde::Serialize;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::drug::{DrugRecord, NewDrugRecord, RawDrugRecord, UpdateDrugRequest};
use crate::repositories::{CatalogStore, VocabularyStore};
use crate::services::normalizer::normalize_ingredients;
use crate::services::vocabulary_service::VocabularyService;

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub inserted_count: usize,
    pub skipped_count: usize,
}

pub struct CatalogService<C, V> {
    catalog: C,
    vocabulary: VocabularyService<V>,
}

impl<C: CatalogStore, V: VocabularyStore> CatalogService<C, V> {
    pub fn new(catalog: C, vocabulary: VocabularyService<V>) -> Self {
        Self { catalog, vocabulary }
    }

    /// Ingests a batch of raw records in two sequential sub-batches: records
    /// carrying an external identifier (deduplicated against the store) and
    /// records without one (the store assigns identifiers, no dedup).
    pub async fn ingest(&self, records: Vec<RawDrugRecord>) -> Result<IngestStats> {
        let mut stats = IngestStats::default();

        let (with_ids, without_ids): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.id.is_some());

        if !with_ids.is_empty() {
            let ids: Vec<Uuid> = with_ids.iter().filter_map(|r| r.id).collect();
            let existing = self.catalog.existing_ids(&ids).await?;

            let (fresh, duplicates): (Vec<_>, Vec<_>) = with_ids
                .into_iter()
                .partition(|r| !existing.contains(&r.id.unwrap()));

            stats.skipped_count += duplicates.len();
            if !duplicates.is_empty() {
                tracing::info!("Skipping {} records with existing identifiers", duplicates.len());
            }

            self.insert_sub_batch(fresh, &mut stats).await;
        }

        self.insert_sub_batch(without_ids, &mut stats).await;

        Ok(stats)
    }

    /// Normalizes and persists one sub-batch. A persistence failure marks the
    /// whole sub-batch as skipped; a reconciliation failure after a committed
    /// insert is logged and swallowed.
    async fn insert_sub_batch(&self, records: Vec<RawDrugRecord>, stats: &mut IngestStats) {
        if records.is_empty() {
            return;
        }

        let batch: Vec<NewDrugRecord> = records
            .into_iter()
            .map(|record| NewDrugRecord {
                id: record.id.unwrap_or_else(Uuid::new_v4),
                cleaned_ingredients: record
                    .ingredients
                    .as_deref()
                    .map(normalize_ingredients)
                    .unwrap_or_default(),
                record,
            })
            .collect();

        let batch_len = batch.len();

        match self.catalog.bulk_insert(batch).await {
            Ok(inserted) => {
                stats.inserted_count += inserted.len();

                let names = distinct_ingredient_names(&inserted);
                if names.is_empty() {
                    return;
                }

                match self.vocabulary.reconcile(&names).await {
                    Ok(reconcile) => tracing::info!(
                        "Vocabulary reconciled: {} added, {} updated",
                        reconcile.added,
                        reconcile.updated
                    ),
                    Err(e) => tracing::error!(
                        "Vocabulary reconciliation failed after catalog insert: {}",
                        e
                    ),
                }
            }
            Err(e) => {
                tracing::error!("Sub-batch insert failed, skipping {} records: {}", batch_len, e);
                stats.skipped_count += batch_len;
            }
        }
    }

    /// Applies a partial update. A change to the raw ingredient text
    /// recomputes the cleaned list and re-reconciles the new names; counts
    /// for names no longer present are never decremented.
    pub async fn update_drug(
        &self,
        id: Uuid,
        update: UpdateDrugRequest,
    ) -> Result<Option<DrugRecord>> {
        let cleaned = update
            .ingredients
            .as_deref()
            .map(normalize_ingredients);

        let updated = self
            .catalog
            .update(id, &update, cleaned.as_deref())
            .await?;

        if let (Some(record), Some(_)) = (&updated, &cleaned) {
            let names = distinct_ingredient_names(std::slice::from_ref(record));
            if !names.is_empty() {
                if let Err(e) = self.vocabulary.reconcile(&names).await {
                    tracing::error!("Vocabulary reconciliation failed after update: {}", e);
                }
            }
        }

        Ok(updated)
    }

    pub async fn count(&self) -> Result<i64> {
        self.catalog.count().await
    }

    pub async fn list(&self, page: i64, limit: i64) -> Result<Vec<DrugRecord>> {
        self.catalog.list(page, limit).await
    }

    pub async fn get_drug(&self, id: Uuid) -> Result<Option<DrugRecord>> {
        self.catalog.find_by_id(id).await
    }

    pub async fn delete_drug(&self, id: Uuid) -> Result<bool> {
        self.catalog.delete(id).await
    }
}

/// Union of distinct non-empty cleaned names across records, first-seen order.
fn distinct_ingredient_names(records: &[DrugRecord]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();

    for record in records {
        for name in &record.cleaned_ingredients {
            if !name.trim().is_empty() && seen.insert(name.clone()) {
                names.push(name.clone());
            }
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use dashmap::DashMap;
    use std::sync::Arc;

    use crate::models::ingredient::CanonicalIngredient;

    #[derive(Clone, Default)]
    struct MemoryCatalog {
        records: Arc<DashMap<Uuid, DrugRecord>>,
        /// Any batch containing this registration number fails wholesale,
        /// simulating a persistence error for one sub-batch.
        poison_registration: Option<String>,
    }

    fn materialize(new: NewDrugRecord) -> DrugRecord {
        let now = Utc::now();
        DrugRecord {
            id: new.id,
            registration_number: new.record.registration_number,
            name: new.record.name,
            ingredients: new.record.ingredients,
            cleaned_ingredients: new.cleaned_ingredients,
            manufacturing_requirements: new.record.manufacturing_requirements,
            unit_of_measure: new.record.unit_of_measure,
            estimated_price: new.record.estimated_price,
            manufacturer: new.record.manufacturer,
            distributor: new.record.distributor,
            year_of_registration: new.record.year_of_registration,
            country_of_origin: new.record.country_of_origin,
            usage_form: new.record.usage_form,
            content_of_review: new.record.content_of_review,
            no_proposals_on_price: new.record.no_proposals_on_price,
            date_of_proposals_on_price: new.record.date_of_proposals_on_price,
            additional_notes: new.record.additional_notes,
            created_at: now,
            updated_at: now,
        }
    }

    #[async_trait]
    impl CatalogStore for MemoryCatalog {
        async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
            Ok(ids
                .iter()
                .copied()
                .filter(|id| self.records.contains_key(id))
                .collect())
        }

        async fn bulk_insert(&self, records: Vec<NewDrugRecord>) -> Result<Vec<DrugRecord>> {
            if let Some(poison) = &self.poison_registration {
                if records.iter().any(|r| &r.record.registration_number == poison) {
                    return Err(crate::middleware::AppError::Internal(anyhow::anyhow!(
                        "simulated insert failure"
                    )));
                }
            }

            let mut inserted = Vec::new();
            for new in records {
                let record = materialize(new);
                self.records.insert(record.id, record.clone());
                inserted.push(record);
            }
            Ok(inserted)
        }

        async fn count(&self) -> Result<i64> {
            Ok(self.records.len() as i64)
        }

        async fn list(&self, _page: i64, _limit: i64) -> Result<Vec<DrugRecord>> {
            Ok(self.records.iter().map(|r| r.clone()).collect())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<DrugRecord>> {
            Ok(self.records.get(&id).map(|r| r.clone()))
        }

        async fn update(
            &self,
            id: Uuid,
            update: &UpdateDrugRequest,
            cleaned_ingredients: Option<&[String]>,
        ) -> Result<Option<DrugRecord>> {
            match self.records.get_mut(&id) {
                Some(mut record) => {
                    if let Some(ingredients) = &update.ingredients {
                        record.ingredients = Some(ingredients.clone());
                    }
                    if let Some(cleaned) = cleaned_ingredients {
                        record.cleaned_ingredients = cleaned.to_vec();
                    }
                    record.updated_at = Utc::now();
                    Ok(Some(record.clone()))
                }
                None => Ok(None),
            }
        }

        async fn delete(&self, id: Uuid) -> Result<bool> {
            Ok(self.records.remove(&id).is_some())
        }
    }

    #[derive(Clone, Default)]
    struct MemoryVocabulary {
        entries: Arc<DashMap<String, CanonicalIngredient>>,
    }

    #[async_trait]
    impl VocabularyStore for MemoryVocabulary {
        async fn find_by_exact_name(&self, name: &str) -> Result<Option<CanonicalIngredient>> {
            Ok(self.entries.get(name).map(|e| e.clone()))
        }

        async fn increment_count_and_touch(&self, name: &str) -> Result<u64> {
            match self.entries.get_mut(name) {
                Some(mut entry) => {
                    entry.count += 1;
                    entry.last_seen = Utc::now();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn insert_new(&self, name: &str) -> Result<bool> {
            let now = Utc::now();
            match self.entries.entry(name.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(CanonicalIngredient {
                        name: name.to_string(),
                        count: 1,
                        first_seen: now,
                        last_seen: now,
                    });
                    Ok(true)
                }
            }
        }

        async fn list_sorted_by_count_desc(
            &self,
            limit: Option<i64>,
        ) -> Result<Vec<CanonicalIngredient>> {
            let mut all: Vec<_> = self.entries.iter().map(|e| e.clone()).collect();
            all.sort_by(|a, b| b.count.cmp(&a.count));
            if let Some(limit) = limit {
                all.truncate(limit as usize);
            }
            Ok(all)
        }

        async fn search_by_pattern(&self, pattern: &str) -> Result<Vec<CanonicalIngredient>> {
            let needle = pattern.to_lowercase();
            Ok(self
                .entries
                .iter()
                .filter(|e| e.name.to_lowercase().contains(&needle))
                .map(|e| e.clone())
                .collect())
        }
    }

    fn raw(id: Option<Uuid>, registration: &str, ingredients: Option<&str>) -> RawDrugRecord {
        RawDrugRecord {
            id,
            registration_number: registration.to_string(),
            name: None,
            ingredients: ingredients.map(|s| s.to_string()),
            manufacturing_requirements: None,
            unit_of_measure: None,
            estimated_price: None,
            manufacturer: None,
            distributor: None,
            year_of_registration: None,
            country_of_origin: None,
            usage_form: None,
            content_of_review: None,
            no_proposals_on_price: None,
            date_of_proposals_on_price: None,
            additional_notes: None,
        }
    }

    fn service(
        catalog: MemoryCatalog,
        vocabulary: MemoryVocabulary,
    ) -> CatalogService<MemoryCatalog, MemoryVocabulary> {
        CatalogService::new(catalog, VocabularyService::new(vocabulary))
    }

    #[tokio::test]
    async fn existing_identifiers_are_skipped_not_overwritten() {
        let catalog = MemoryCatalog::default();
        let vocabulary = MemoryVocabulary::default();
        let svc = service(catalog.clone(), vocabulary.clone());

        let dup_a = Uuid::new_v4();
        let dup_b = Uuid::new_v4();
        svc.ingest(vec![
            raw(Some(dup_a), "VN-001-23", None),
            raw(Some(dup_b), "VN-002-23", None),
        ])
        .await
        .unwrap();

        let stats = svc
            .ingest(vec![
                raw(Some(dup_a), "VN-001-23", None),
                raw(Some(dup_b), "VN-002-23", None),
                raw(Some(Uuid::new_v4()), "VN-003-23", None),
                raw(Some(Uuid::new_v4()), "VN-004-23", None),
            ])
            .await
            .unwrap();

        assert_eq!(stats.inserted_count, 2);
        assert_eq!(stats.skipped_count, 2);
        assert_eq!(catalog.records.len(), 4);
    }

    #[tokio::test]
    async fn absent_ingredient_text_yields_empty_list_and_no_vocabulary() {
        let vocabulary = MemoryVocabulary::default();
        let svc = service(MemoryCatalog::default(), vocabulary.clone());

        let stats = svc
            .ingest(vec![raw(None, "VN-010-23", None)])
            .await
            .unwrap();

        assert_eq!(stats.inserted_count, 1);
        assert!(vocabulary.entries.is_empty());
    }

    #[tokio::test]
    async fn failing_sub_batch_is_counted_as_skipped() {
        let catalog = MemoryCatalog {
            poison_registration: Some("BAD".to_string()),
            ..Default::default()
        };
        let svc = service(catalog, MemoryVocabulary::default());

        // The identifier-carrying sub-batch succeeds; the one without
        // identifiers contains the poison record and fails wholesale.
        let stats = svc
            .ingest(vec![
                raw(Some(Uuid::new_v4()), "VN-020-23", None),
                raw(None, "BAD", None),
                raw(None, "VN-021-23", None),
            ])
            .await
            .unwrap();

        assert_eq!(stats.inserted_count, 1);
        assert_eq!(stats.skipped_count, 2);
    }

    #[tokio::test]
    async fn ingest_reconciles_distinct_names_across_the_batch() {
        let vocabulary = MemoryVocabulary::default();
        let svc = service(MemoryCatalog::default(), vocabulary.clone());

        svc.ingest(vec![
            raw(None, "VN-030-23", Some("Paracetamol 500mg, Cafein 50mg")),
            raw(None, "VN-031-23", Some("Paracetamol 250mg")),
        ])
        .await
        .unwrap();

        // Distinct union across the sub-batch: each name observed once.
        let para = vocabulary.entries.get("Paracetamol").unwrap();
        assert_eq!(para.count, 1);
        let cafein = vocabulary.entries.get("Cafein").unwrap();
        assert_eq!(cafein.count, 1);
    }

    #[tokio::test]
    async fn updating_ingredients_recomputes_and_re_reconciles() {
        let catalog = MemoryCatalog::default();
        let vocabulary = MemoryVocabulary::default();
        let svc = service(catalog.clone(), vocabulary.clone());

        let id = Uuid::new_v4();
        svc.ingest(vec![raw(Some(id), "VN-040-23", Some("Aspirin 100mg"))])
            .await
            .unwrap();

        let update = UpdateDrugRequest {
            registration_number: None,
            name: None,
            ingredients: Some("Clopidogrel 75mg".to_string()),
            manufacturing_requirements: None,
            unit_of_measure: None,
            estimated_price: None,
            manufacturer: None,
            distributor: None,
            year_of_registration: None,
            country_of_origin: None,
            usage_form: None,
            content_of_review: None,
            no_proposals_on_price: None,
            date_of_proposals_on_price: None,
            additional_notes: None,
        };

        let updated = svc.update_drug(id, update).await.unwrap().unwrap();
        assert_eq!(updated.cleaned_ingredients, vec!["Clopidogrel"]);

        // New name reconciled, old count untouched (no decrement).
        assert_eq!(vocabulary.entries.get("Clopidogrel").unwrap().count, 1);
        assert_eq!(vocabulary.entries.get("Aspirin").unwrap().count, 1);
    }
}
