// src/middleware/clinic.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::common::error::AppError;

// Cabeçalho que escolhe a clínica
pub const CLINIC_TAG_HEADER: &str = "x-clinic-tag";

/// Clínica a que a requisição se refere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicContext(pub String);

impl ClinicContext {
    /// Aceita de 1 a 32 caracteres entre `a-z`, `0-9`, `_` e `-`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let tag = raw.trim();
        let valid = !tag.is_empty()
            && tag.len() <= 32
            && tag
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');

        if !valid {
            return Err(AppError::BadRequest(format!("invalid {CLINIC_TAG_HEADER}: {tag:?}")));
        }
        Ok(ClinicContext(tag.to_string()))
    }
}

impl<S> FromRequestParts<S> for ClinicContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CLINIC_TAG_HEADER)
            .ok_or_else(|| AppError::BadRequest(format!("{CLINIC_TAG_HEADER} header is required")))?;

        let raw = value
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{CLINIC_TAG_HEADER} is not ASCII")))?;

        ClinicContext::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_tags() {
        assert_eq!(ClinicContext::parse("gangnam").unwrap().0, "gangnam");
        assert_eq!(ClinicContext::parse(" busan_2 ").unwrap().0, "busan_2");
    }

    #[test]
    fn rejects_anything_else() {
        for raw in ["", "Gangnam", "a b", "x;drop", &"a".repeat(33)] {
            assert!(ClinicContext::parse(raw).is_err(), "{raw:?} deveria falhar");
        }
    }
}
