// src/handlers/records.rs

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, clinic::ClinicContext, i18n::Locale},
    models::{
        auth::User,
        record::{ChartRecord, RecordFields, RecordFilter, RecordUpdate},
    },
    services::workflow::{TreatmentAction, TreatmentActionPayload},
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InsertRecordsPayload {
    #[validate(length(min = 1, max = 200, message = "Envie de 1 a 200 registros."), nested)]
    pub records: Vec<RecordFields>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRecordPayload {
    #[validate(nested)]
    pub record: RecordUpdate,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GetRecordsPayload {
    #[serde(default)]
    pub filters: Vec<RecordFilter>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HideRecordsPayload {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HideRecordsResponse {
    pub hidden: usize,
    pub record_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockRecordsPayload {
    pub record_ids: Vec<i64>,
    /// O próprio id para travar; `null` para destravar.
    #[serde(default)]
    pub locking_user: Option<i64>,
    /// Escrita incondicional, só para admin.
    #[serde(default)]
    pub force: bool,
}

// ---
// Handlers
// ---

#[utoipa::path(
    post,
    path = "/api/insertRecords",
    tag = "Records",
    request_body = InsertRecordsPayload,
    responses(
        (status = 200, description = "Registros criados", body = Vec<ChartRecord>),
        (status = 400, description = "Dados inválidos")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn insert_records(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<InsertRecordsPayload>,
) -> Result<Json<Vec<ChartRecord>>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let records = app_state
        .record_service
        .insert_records(&clinic, &payload.records)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(records))
}

#[utoipa::path(
    put,
    path = "/api/updateRecord",
    tag = "Records",
    request_body = UpdateRecordPayload,
    responses(
        (status = 200, description = "Registro salvo e destravado", body = ChartRecord),
        (status = 404, description = "Registro inexistente ou oculto"),
        (status = 409, description = "Travado por outro usuário")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn update_record(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<UpdateRecordPayload>,
) -> Result<Json<ChartRecord>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let record = app_state
        .record_service
        .update_record(&clinic, &user, &payload.record)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/api/getRecords",
    tag = "Records",
    request_body = GetRecordsPayload,
    responses((status = 200, description = "Registros ativos em ordem de check-in", body = Vec<ChartRecord>)),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn get_records(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<GetRecordsPayload>,
) -> Result<Json<Vec<ChartRecord>>, ApiError> {
    let records = app_state
        .record_service
        .list_records(&clinic, &payload.filters)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(records))
}

#[utoipa::path(
    put,
    path = "/api/hideRecords",
    tag = "Records",
    request_body = HideRecordsPayload,
    responses(
        (status = 200, description = "Registros ocultados", body = HideRecordsResponse),
        (status = 409, description = "Algum registro está travado por outro usuário")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn hide_records(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<HideRecordsPayload>,
) -> Result<Json<HideRecordsResponse>, ApiError> {
    let record_ids = app_state
        .record_service
        .hide_records(&clinic, &user, &payload.ids)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(HideRecordsResponse {
        hidden: record_ids.len(),
        record_ids,
    }))
}

#[utoipa::path(
    put,
    path = "/api/lockOrUnlockRecords",
    tag = "Records",
    request_body = LockRecordsPayload,
    responses(
        (status = 200, description = "Registros travados/destravados", body = Vec<ChartRecord>),
        (status = 403, description = "Travar em nome de outro usuário ou force sem ser admin"),
        (status = 409, description = "Já travado por outro usuário")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn lock_or_unlock_records(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<LockRecordsPayload>,
) -> Result<Json<Vec<ChartRecord>>, ApiError> {
    let records = app_state
        .record_service
        .lock_records(
            &clinic,
            &user,
            &payload.record_ids,
            payload.locking_user,
            payload.force,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(records))
}

// ---
// Fluxo de tratamento
// ---

async fn run_treatment_action(
    app_state: &AppState,
    locale: &Locale,
    user: &User,
    clinic: &str,
    action: TreatmentAction,
    payload: TreatmentActionPayload,
) -> Result<Json<ChartRecord>, ApiError> {
    let record = app_state
        .record_service
        .apply_treatment_action(clinic, user, action, payload.record_id, payload.treatment_number)
        .await
        .map_err(|e| e.to_api_error(locale, &app_state.i18n_store))?;

    Ok(Json(record))
}

#[utoipa::path(
    put,
    path = "/api/markTreatmentReady",
    tag = "Workflow",
    request_body = TreatmentActionPayload,
    responses(
        (status = 200, description = "Tratamento preparado (Y)", body = ChartRecord),
        (status = 409, description = "Transição inválida ou registro travado")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn mark_treatment_ready(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<TreatmentActionPayload>,
) -> Result<Json<ChartRecord>, ApiError> {
    run_treatment_action(&app_state, &locale, &user, &clinic, TreatmentAction::MarkReady, payload).await
}

#[utoipa::path(
    put,
    path = "/api/startTreatment",
    tag = "Workflow",
    request_body = TreatmentActionPayload,
    responses(
        (status = 200, description = "Tratamento iniciado (P)", body = ChartRecord),
        (status = 409, description = "Transição inválida ou registro travado")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn start_treatment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<TreatmentActionPayload>,
) -> Result<Json<ChartRecord>, ApiError> {
    run_treatment_action(&app_state, &locale, &user, &clinic, TreatmentAction::Start, payload).await
}

#[utoipa::path(
    put,
    path = "/api/completeTreatment",
    tag = "Workflow",
    request_body = TreatmentActionPayload,
    responses(
        (status = 200, description = "Tratamento concluído", body = ChartRecord),
        (status = 409, description = "Transição inválida ou registro travado")
    ),
    params(("x-clinic-tag" = String, Header, description = "Clínica")),
    security(("api_jwt" = []))
)]
pub async fn complete_treatment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    ClinicContext(clinic): ClinicContext,
    Json(payload): Json<TreatmentActionPayload>,
) -> Result<Json<ChartRecord>, ApiError> {
    run_treatment_action(&app_state, &locale, &user, &clinic, TreatmentAction::Complete, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lock_payload_defaults_to_unlock_without_force() {
        let payload: LockRecordsPayload =
            serde_json::from_value(json!({ "recordIds": [1, 2] })).unwrap();
        assert_eq!(payload.record_ids, vec![1, 2]);
        assert_eq!(payload.locking_user, None);
        assert!(!payload.force);
    }

    #[test]
    fn insert_payload_rejects_empty_batches() {
        let payload: InsertRecordsPayload = serde_json::from_value(json!({ "records": [] })).unwrap();
        assert!(payload.validate().is_err());

        let payload: InsertRecordsPayload = serde_json::from_value(json!({
            "records": [{ "chartNum": "C-1", "patientName": "Hong", "treatments": [] }]
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn update_payload_validates_nested_treatments() {
        let slots: Vec<_> = (0..6).map(|i| json!({ "treatment": format!("t{i}") })).collect();
        let payload: UpdateRecordPayload = serde_json::from_value(json!({
            "record": { "id": 1, "treatments": slots }
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
