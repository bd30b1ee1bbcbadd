//! Canonical ingredient vocabulary reconciliation.
//!
//! Merges observed ingredient names into the shared vocabulary store. One
//! observation is one count increment, including repeats within a single
//! input; callers that want distinct-drug semantics deduplicate first.

use serde::Serialize;

use crate::middleware::error_handling::Result;
use crate::models::ingredient::CanonicalIngredient;
use crate::repositories::VocabularyStore;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileStats {
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Default, Clone)]
pub struct AddOutcome {
    pub added: usize,
    pub total: usize,
}

pub struct VocabularyService<S> {
    store: S,
}

impl<S: VocabularyStore> VocabularyService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Upserts each observed name: an atomic increment when the name exists,
    /// otherwise a fresh entry with count 1. A concurrent first observation
    /// of the same name loses the insert race and retries as an increment,
    /// so no increment is ever dropped and no name is ever duplicated.
    pub async fn reconcile(&self, names: &[String]) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }

            if self.store.increment_count_and_touch(name).await? > 0 {
                stats.updated += 1;
                continue;
            }

            if self.store.insert_new(name).await? {
                stats.added += 1;
            } else {
                // Lost the insert race; the row exists now.
                self.store.increment_count_and_touch(name).await?;
                stats.updated += 1;
            }
        }

        Ok(stats)
    }

    /// Adds names to the vocabulary without bumping counts of existing
    /// entries. Request-level duplicates are collapsed case-insensitively
    /// before touching the store.
    pub async fn add_ingredients(&self, names: Vec<String>) -> Result<AddOutcome> {
        let mut seen = std::collections::HashSet::new();
        let mut outcome = AddOutcome::default();

        for name in names {
            let name = name.trim().to_string();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }

            outcome.total += 1;
            if self.store.insert_new(&name).await? {
                outcome.added += 1;
            }
        }

        Ok(outcome)
    }

    pub async fn list_all(&self) -> Result<Vec<CanonicalIngredient>> {
        self.store.list_sorted_by_count_desc(None).await
    }

    pub async fn top(&self, limit: i64) -> Result<Vec<CanonicalIngredient>> {
        self.store.list_sorted_by_count_desc(Some(limit)).await
    }

    pub async fn search(&self, pattern: &str) -> Result<Vec<CanonicalIngredient>> {
        self.store.search_by_pattern(pattern).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory vocabulary backed by DashMap. The entry API gives the same
    /// atomic single-row semantics the Postgres store provides.
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
            let mut matches: Vec<_> = self
                .entries
                .iter()
                .filter(|e| e.name.to_lowercase().contains(&needle))
                .map(|e| e.clone())
                .collect();
            matches.sort_by(|a, b| b.count.cmp(&a.count));
            Ok(matches)
        }
    }

    #[tokio::test]
    async fn first_observation_adds_second_updates() {
        let store = MemoryVocabulary::default();
        let service = VocabularyService::new(store.clone());

        let first = service.reconcile(&["Aspirin".to_string()]).await.unwrap();
        assert_eq!(first.added, 1);
        assert_eq!(first.updated, 0);

        let second = service.reconcile(&["Aspirin".to_string()]).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 1);

        let entry = store.find_by_exact_name("Aspirin").await.unwrap().unwrap();
        assert_eq!(entry.count, 2);
    }

    #[tokio::test]
    async fn duplicate_occurrences_each_count() {
        let service = VocabularyService::new(MemoryVocabulary::default());

        let names = vec!["Paracetamol".to_string(), "Paracetamol".to_string()];
        let stats = service.reconcile(&names).await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.updated, 1);

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].count, 2);
    }

    #[tokio::test]
    async fn blank_names_are_skipped() {
        let service = VocabularyService::new(MemoryVocabulary::default());

        let names = vec!["".to_string(), "  ".to_string(), "Cafein".to_string()];
        let stats = service.reconcile(&names).await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.updated, 0);
    }

    #[tokio::test]
    async fn concurrent_first_reconciliation_keeps_single_entry() {
        let store = MemoryVocabulary::default();
        let service = Arc::new(VocabularyService::new(store.clone()));

        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.reconcile(&["Ibuprofen".to_string()]).await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.reconcile(&["Ibuprofen".to_string()]).await })
        };

        let stats_a = a.await.unwrap().unwrap();
        let stats_b = b.await.unwrap().unwrap();

        // Exactly one writer creates the entry; no increment is lost.
        assert_eq!(stats_a.added + stats_b.added, 1);
        assert_eq!(stats_a.updated + stats_b.updated, 1);

        let entry = store.find_by_exact_name("Ibuprofen").await.unwrap().unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(store.entries.len(), 1);
    }

    #[tokio::test]
    async fn add_ingredients_deduplicates_request_and_skips_existing() {
        let service = VocabularyService::new(MemoryVocabulary::default());

        service.reconcile(&["Aspirin".to_string()]).await.unwrap();

        let outcome = service
            .add_ingredients(vec![
                "Aspirin".to_string(),
                "Cafein".to_string(),
                "cafein".to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.total, 2);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_sorted_by_count() {
        let service = VocabularyService::new(MemoryVocabulary::default());

        service
            .reconcile(&[
                "Paracetamol".to_string(),
                "Paracetamol".to_string(),
                "Parafin".to_string(),
            ])
            .await
            .unwrap();

        let matches = service.search("para").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "Paracetamol");
    }
}
