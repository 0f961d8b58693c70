use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    common::i18n::{DEFAULT_LANG, I18nStore},
    middleware::i18n::Locale,
    models::{auth::LoginErrorType, record::LockConflict},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("ID de login inexistente")]
    LoginIdNotFound,

    #[error("Senha incorreta")]
    WrongPassword,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Ação não permitida: {0}")]
    Forbidden(String),

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("ID de login já existe")]
    LoginIdAlreadyExists,

    #[error("Registro {0} não encontrado")]
    RecordNotFound(i64),

    #[error("Registro bloqueado por outro usuário")]
    RecordLocked(Vec<LockConflict>),

    #[error("Transição de tratamento inválida: {0}")]
    InvalidTransition(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Corpo de erro devolvido pela API.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<LoginErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::LoginIdNotFound | AppError::WrongPassword | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AppError::LoginIdAlreadyExists
            | AppError::RecordLocked(_)
            | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::LoginIdNotFound => "login_id_not_found",
            AppError::WrongPassword => "wrong_password",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden(_) => "forbidden",
            AppError::UserNotFound => "user_not_found",
            AppError::LoginIdAlreadyExists => "login_id_taken",
            AppError::RecordNotFound(_) => "record_not_found",
            AppError::RecordLocked(_) => "record_locked",
            AppError::InvalidTransition(_) => "invalid_transition",
            _ => "internal",
        }
    }

    /// Converte o erro no corpo HTTP, traduzindo a mensagem para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Erro Interno do Servidor");
        }

        let error_type = match self {
            AppError::LoginIdNotFound => Some(LoginErrorType::UnknownId),
            AppError::WrongPassword => Some(LoginErrorType::WrongPassword),
            _ => None,
        };

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                Some(Value::Object(details))
            }
            AppError::RecordLocked(conflicts) => Some(json!({ "conflicts": conflicts })),
            AppError::RecordNotFound(id) => Some(json!({ "recordId": id })),
            AppError::BadRequest(reason)
            | AppError::Forbidden(reason)
            | AppError::InvalidTransition(reason) => Some(json!({ "reason": reason })),
            _ => None,
        };

        ApiError {
            status,
            error: i18n.translate(&locale.0, self.message_key()),
            error_type,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale(DEFAULT_LANG.to_string()), &I18nStore::default())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ko() -> Locale {
        Locale("ko".to_string())
    }

    #[test]
    fn login_errors_carry_error_type() {
        let store = I18nStore::default();

        let unknown = AppError::LoginIdNotFound.to_api_error(&ko(), &store);
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.error_type, Some(LoginErrorType::UnknownId));
        assert_eq!(unknown.error, "해당 아이디가 존재하지않습니다.");

        let wrong = AppError::WrongPassword.to_api_error(&ko(), &store);
        assert_eq!(wrong.error_type, Some(LoginErrorType::WrongPassword));
    }

    #[test]
    fn database_errors_hide_details() {
        let store = I18nStore::default();
        let api = AppError::DatabaseError(sqlx::Error::PoolTimedOut)
            .to_api_error(&Locale("en".into()), &store);

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error, "Internal server error.");
        assert!(api.details.is_none());
    }

    #[test]
    fn record_locked_lists_conflicts() {
        let store = I18nStore::default();
        let api = AppError::RecordLocked(vec![LockConflict {
            record_id: 42,
            locking_user: 7,
            lock_expires_at: None,
        }])
        .to_api_error(&Locale("en".into()), &store);

        assert_eq!(api.status, StatusCode::CONFLICT);
        let details = api.details.unwrap();
        assert_eq!(details["conflicts"][0]["recordId"], 42);
        assert_eq!(details["conflicts"][0]["lockingUser"], 7);
    }
}
