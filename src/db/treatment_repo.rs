// src/db/treatment_repo.rs

use sqlx::PgPool;

use crate::{common::error::AppError, models::treatment::Treatment};

#[derive(Clone)]
pub struct TreatmentRepository {
    pool: PgPool,
}

impl TreatmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_treatments(&self, clinic_tag: &str) -> Result<Vec<Treatment>, AppError> {
        let treatments = sqlx::query_as::<_, Treatment>(
            r#"
            SELECT tr_id, tr_group, tr_title, tr_duration, tr_point, tr_price
            FROM treatment
            WHERE clinic_tag = $1
            ORDER BY tr_group, tr_title
            "#,
        )
        .bind(clinic_tag)
        .fetch_all(&self.pool)
        .await?;

        Ok(treatments)
    }
}
