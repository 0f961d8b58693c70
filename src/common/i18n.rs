// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LANG: &str = "en";

/// Catálogo de mensagens de erro por idioma.
///
/// As chaves são as mesmas usadas por `AppError::message_key`. Idiomas sem
/// tradução caem para `DEFAULT_LANG`, e chaves desconhecidas voltam como estão.
pub struct I18nStore {
    messages: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl I18nStore {
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.messages
            .get(lang)
            .and_then(|table| table.get(key))
            .or_else(|| {
                self.messages
                    .get(DEFAULT_LANG)
                    .and_then(|table| table.get(key))
            })
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.messages.contains_key(lang)
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        let en = HashMap::from([
            ("validation", "One or more fields are invalid."),
            ("bad_request", "Invalid request."),
            ("login_id_not_found", "This ID does not exist."),
            ("wrong_password", "The password is incorrect."),
            ("invalid_token", "Authentication token is invalid or missing."),
            ("forbidden", "You are not allowed to perform this action."),
            ("user_not_found", "User not found."),
            ("record_not_found", "Record not found."),
            ("record_locked", "The record is being edited by another user."),
            ("login_id_taken", "The same ID already exists."),
            ("invalid_transition", "The treatment cannot move to that state."),
            ("internal", "Internal server error."),
        ]);
        let ko = HashMap::from([
            ("validation", "입력값이 올바르지 않습니다."),
            ("bad_request", "잘못된 요청입니다."),
            ("login_id_not_found", "해당 아이디가 존재하지않습니다."),
            ("wrong_password", "비밀번호가 틀렸습니다."),
            ("invalid_token", "인증 토큰이 유효하지 않습니다."),
            ("forbidden", "권한이 없습니다."),
            ("user_not_found", "해당 유저가 존재하지않습니다."),
            ("record_not_found", "레코드를 찾을 수 없습니다."),
            ("record_locked", "다른 사용자가 편집 중인 레코드입니다."),
            ("login_id_taken", "동일한 아이디가 존재합니다."),
            ("invalid_transition", "해당 시술 상태로 변경할 수 없습니다."),
            ("internal", "서버 에러"),
        ]);

        Self {
            messages: HashMap::from([("en", en), ("ko", ko)]),
        }
    }
}
