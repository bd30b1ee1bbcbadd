use async_trait::async_trait;
use sqlx::{query, query_as, PgPool};
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::drug::{DrugRecord, NewDrugRecord, UpdateDrugRequest};
use crate::repositories::CatalogStore;

const DRUG_COLUMNS: &str = "id, registration_number, name, ingredients, cleaned_ingredients, \
     manufacturing_requirements, unit_of_measure, estimated_price, manufacturer, distributor, \
     year_of_registration, country_of_origin, usage_form, content_of_review, \
     no_proposals_on_price, date_of_proposals_on_price, additional_notes, created_at, updated_at";

pub struct DrugRepository {
    pool: PgPool,
}

impl DrugRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for DrugRepository {
    async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(Uuid,)> = query_as("SELECT id FROM drug_catalog WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn bulk_insert(&self, records: Vec<NewDrugRecord>) -> Result<Vec<DrugRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(records.len());

        for new in records {
            let row: DrugRecord = query_as(&format!(
                r#"
                INSERT INTO drug_catalog (
                    id, registration_number, name, ingredients, cleaned_ingredients,
                    manufacturing_requirements, unit_of_measure, estimated_price,
                    manufacturer, distributor, year_of_registration, country_of_origin,
                    usage_form, content_of_review, no_proposals_on_price,
                    date_of_proposals_on_price, additional_notes
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                RETURNING {DRUG_COLUMNS}
                "#
            ))
            .bind(new.id)
            .bind(&new.record.registration_number)
            .bind(&new.record.name)
            .bind(&new.record.ingredients)
            .bind(&new.cleaned_ingredients)
            .bind(&new.record.manufacturing_requirements)
            .bind(&new.record.unit_of_measure)
            .bind(new.record.estimated_price)
            .bind(&new.record.manufacturer)
            .bind(&new.record.distributor)
            .bind(&new.record.year_of_registration)
            .bind(&new.record.country_of_origin)
            .bind(&new.record.usage_form)
            .bind(&new.record.content_of_review)
            .bind(&new.record.no_proposals_on_price)
            .bind(&new.record.date_of_proposals_on_price)
            .bind(&new.record.additional_notes)
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(row);
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM drug_catalog")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list(&self, page: i64, limit: i64) -> Result<Vec<DrugRecord>> {
        let offset = (page - 1) * limit;

        let records = query_as(&format!(
            "SELECT {DRUG_COLUMNS} FROM drug_catalog ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DrugRecord>> {
        let record = query_as(&format!(
            "SELECT {DRUG_COLUMNS} FROM drug_catalog WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        update: &UpdateDrugRequest,
        cleaned_ingredients: Option<&[String]>,
    ) -> Result<Option<DrugRecord>> {
        let record = query_as(&format!(
            r#"
            UPDATE drug_catalog SET
                registration_number = COALESCE($2, registration_number),
                name = COALESCE($3, name),
                ingredients = COALESCE($4, ingredients),
                cleaned_ingredients = COALESCE($5, cleaned_ingredients),
                manufacturing_requirements = COALESCE($6, manufacturing_requirements),
                unit_of_measure = COALESCE($7, unit_of_measure),
                estimated_price = COALESCE($8, estimated_price),
                manufacturer = COALESCE($9, manufacturer),
                distributor = COALESCE($10, distributor),
                year_of_registration = COALESCE($11, year_of_registration),
                country_of_origin = COALESCE($12, country_of_origin),
                usage_form = COALESCE($13, usage_form),
                content_of_review = COALESCE($14, content_of_review),
                no_proposals_on_price = COALESCE($15, no_proposals_on_price),
                date_of_proposals_on_price = COALESCE($16, date_of_proposals_on_price),
                additional_notes = COALESCE($17, additional_notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {DRUG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.registration_number)
        .bind(&update.name)
        .bind(&update.ingredients)
        .bind(cleaned_ingredients.map(|c| c.to_vec()))
        .bind(&update.manufacturing_requirements)
        .bind(&update.unit_of_measure)
        .bind(update.estimated_price)
        .bind(&update.manufacturer)
        .bind(&update.distributor)
        .bind(&update.year_of_registration)
        .bind(&update.country_of_origin)
        .bind(&update.usage_form)
        .bind(&update.content_of_review)
        .bind(&update.no_proposals_on_price)
        .bind(&update.date_of_proposals_on_price)
        .bind(&update.additional_notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = query("DELETE FROM drug_catalog WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
