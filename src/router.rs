// src/router.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard, ws};

/// Monta o router completo da API, do WebSocket e da documentação.
pub fn create_router(app_state: AppState) -> Router {
    // Rotas públicas
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/checkSameIDExists", get(handlers::auth::check_same_id_exists));

    // Rotas protegidas pelo JWT
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/getUserByID", get(handlers::auth::get_user_by_id))
        .route("/getAllRoleEmployees", get(handlers::auth::get_all_role_employees))
        .route("/getAllTreatments", get(handlers::catalog::get_all_treatments));

    // Prontuários: JWT + x-clinic-tag
    let record_routes = Router::new()
        .route("/insertRecords", post(handlers::records::insert_records))
        .route("/updateRecord", put(handlers::records::update_record))
        .route("/getRecords", post(handlers::records::get_records))
        .route("/hideRecords", put(handlers::records::hide_records))
        .route("/lockOrUnlockRecords", put(handlers::records::lock_or_unlock_records))
        .route("/markTreatmentReady", put(handlers::records::mark_treatment_ready))
        .route("/startTreatment", put(handlers::records::start_treatment))
        .route("/completeTreatment", put(handlers::records::complete_treatment));

    let protected = user_routes
        .merge(record_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let api = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(protected);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::ws_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
