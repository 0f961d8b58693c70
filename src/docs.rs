// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::check_same_id_exists,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::get_user_by_id,
        handlers::auth::get_all_role_employees,

        // --- Catalog ---
        handlers::catalog::get_all_treatments,

        // --- Records ---
        handlers::records::insert_records,
        handlers::records::update_record,
        handlers::records::get_records,
        handlers::records::hide_records,
        handlers::records::lock_or_unlock_records,

        // --- Workflow ---
        handlers::records::mark_treatment_ready,
        handlers::records::start_treatment,
        handlers::records::complete_treatment,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::UserEnvelope,

            // --- Records ---
            models::record::OpReadiness,
            models::record::TableType,
            models::record::TreatmentSlot,
            models::record::ChartRecord,
            models::record::RecordFields,
            models::record::RecordUpdate,
            models::record::RecordFilter,
            models::record::LockConflict,
            models::treatment::Treatment,

            // --- Payloads ---
            handlers::records::InsertRecordsPayload,
            handlers::records::UpdateRecordPayload,
            handlers::records::GetRecordsPayload,
            handlers::records::HideRecordsPayload,
            handlers::records::HideRecordsResponse,
            handlers::records::LockRecordsPayload,
            services::workflow::TreatmentActionPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Usuários e funcionários"),
        (name = "Catalog", description = "Catálogo de tratamentos"),
        (name = "Records", description = "Prontuários e travas de edição"),
        (name = "Workflow", description = "Preparo, início e conclusão de tratamentos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}
