// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{
        AuthResponse, LoginErrorType, LoginIdQuery, LoginUserPayload, RegisterUserPayload,
        RoleQuery, User, UserEnvelope, UserIdQuery,
    },
};

#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Auth",
    request_body = RegisterUserPayload,
    responses(
        (status = 200, description = "Usuário criado", body = UserEnvelope),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "ID de login já existe")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<RegisterUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .auth_service
        .register_user(&payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(UserEnvelope { user })))
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Token e usuário", body = AuthResponse),
        (status = 401, description = "errorType 1 = ID inexistente, 2 = senha errada")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let (token, user) = app_state
        .auth_service
        .login_user(&payload.login_id, &payload.password)
        .await
        .map_err(|e| {
            let mut api_error = e.to_api_error(&locale, &app_state.i18n_store);
            if api_error.status == StatusCode::INTERNAL_SERVER_ERROR {
                api_error.error_type = Some(LoginErrorType::Server);
            }
            api_error
        })?;

    tracing::info!(user_id = user.id, "Login efetuado");
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses((status = 200, description = "Usuário autenticado", body = User)),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

#[utoipa::path(
    get,
    path = "/api/getUserByID",
    tag = "Users",
    params(UserIdQuery),
    responses(
        (status = 200, description = "Usuário encontrado", body = UserEnvelope),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_user_by_id(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = app_state
        .user_repo
        .find_by_id(query.id)
        .await
        .and_then(|found| found.ok_or(AppError::UserNotFound))
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(UserEnvelope { user }))
}

#[utoipa::path(
    get,
    path = "/api/checkSameIDExists",
    tag = "Auth",
    params(LoginIdQuery),
    responses(
        (status = 200, description = "ID disponível"),
        (status = 409, description = "ID já existe")
    )
)]
pub async fn check_same_id_exists(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<LoginIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let taken = app_state
        .user_repo
        .login_id_exists(&query.login_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    if taken {
        return Err(AppError::LoginIdAlreadyExists.to_api_error(&locale, &app_state.i18n_store));
    }
    Ok(Json(json!({})))
}

#[utoipa::path(
    get,
    path = "/api/getAllRoleEmployees",
    tag = "Users",
    params(RoleQuery),
    responses((status = 200, description = "Funcionários com o cargo", body = Vec<User>)),
    security(("api_jwt" = []))
)]
pub async fn get_all_role_employees(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<RoleQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = app_state
        .user_repo
        .list_by_role(query.role)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(users))
}
