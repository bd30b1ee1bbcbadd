use async_trait::async_trait;
use sqlx::{query, query_as, PgPool};

use crate::middleware::error_handling::Result;
use crate::models::ingredient::CanonicalIngredient;
use crate::repositories::VocabularyStore;

pub struct IngredientRepository {
    pool: PgPool,
}

impl IngredientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VocabularyStore for IngredientRepository {
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<CanonicalIngredient>> {
        let entry = query_as(
            "SELECT name, count, first_seen, last_seen FROM canonical_ingredients WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn increment_count_and_touch(&self, name: &str) -> Result<u64> {
        let result = query(
            "UPDATE canonical_ingredients SET count = count + 1, last_seen = NOW() WHERE name = $1",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_new(&self, name: &str) -> Result<bool> {
        // The unique constraint on name arbitrates concurrent first inserts;
        // the loser sees zero rows affected and falls back to an increment.
        let result = query(
            r#"
            INSERT INTO canonical_ingredients (name, count, first_seen, last_seen)
            VALUES ($1, 1, NOW(), NOW())
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_sorted_by_count_desc(&self, limit: Option<i64>) -> Result<Vec<CanonicalIngredient>> {
        let entries = match limit {
            Some(limit) => {
                query_as(
                    "SELECT name, count, first_seen, last_seen FROM canonical_ingredients \
                     ORDER BY count DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                query_as(
                    "SELECT name, count, first_seen, last_seen FROM canonical_ingredients \
                     ORDER BY count DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(entries)
    }

    async fn search_by_pattern(&self, pattern: &str) -> Result<Vec<CanonicalIngredient>> {
        let entries = query_as(
            "SELECT name, count, first_seen, last_seen FROM canonical_ingredients \
             WHERE name ILIKE $1 ORDER BY count DESC",
        )
        .bind(format!("%{}%", pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
