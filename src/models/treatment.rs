// src/models/treatment.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Item do catálogo de tratamentos da clínica.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    #[schema(example = "botox_forehead")]
    pub tr_id: String,
    #[schema(example = "Botox")]
    pub tr_group: String,
    #[schema(example = "Forehead botox")]
    pub tr_title: String,
    /// Duração em minutos.
    #[schema(example = 30)]
    pub tr_duration: i32,
    #[schema(example = 3)]
    pub tr_point: i32,
    #[schema(value_type = f64, example = 150000.0)]
    pub tr_price: Decimal,
}
