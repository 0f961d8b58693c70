// src/handlers/catalog.rs

use axum::{Json, extract::State};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, clinic::ClinicContext, i18n::Locale},
    models::treatment::Treatment,
};

#[utoipa::path(
    get,
    path = "/api/getAllTreatments",
    tag = "Catalog",
    responses((status = 200, description = "Catálogo de tratamentos da clínica", body = Vec<Treatment>)),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn get_all_treatments(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
) -> Result<Json<Vec<Treatment>>, ApiError> {
    let treatments = app_state
        .treatment_repo
        .list_treatments(&clinic)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(treatments))
}
