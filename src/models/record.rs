// src/models/record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

// --- Enums ---

/// Etapa do prontuário no fluxo de atendimento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "op_readiness")]
pub enum OpReadiness {
    /// Ainda há tratamento sem preparo.
    #[default]
    #[sqlx(rename = "N")]
    #[serde(rename = "N")]
    NotReady,
    #[sqlx(rename = "Y")]
    #[serde(rename = "Y")]
    Ready,
    #[sqlx(rename = "P")]
    #[serde(rename = "P")]
    InProgress,
    #[sqlx(rename = "C")]
    #[serde(rename = "C")]
    Complete,
}

/// Tabela lógica em que o cliente exibe o registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TableType {
    Ready,
    ExceptReady,
    Archive,
}

// --- Tratamentos ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentSlot {
    /// `tr_id` do catálogo de tratamentos.
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "botox_forehead")]
    pub treatment: Option<String>,
    #[validate(range(min = 0, max = 999))]
    #[schema(example = 1)]
    pub quantity: Option<i32>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub end_at: Option<DateTime<Utc>>,
}

impl TreatmentSlot {
    pub fn is_assigned(&self) -> bool {
        self.treatment.is_some()
    }

    pub fn can_be_readied(&self) -> bool {
        self.is_assigned() && self.ready_at.is_none()
    }

    pub fn can_be_started(&self) -> bool {
        self.is_assigned() && self.ready_at.is_some() && self.start_at.is_none()
    }

    pub fn can_be_completed(&self) -> bool {
        self.start_at.is_some() && self.end_at.is_none()
    }
}

// --- Registro ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    #[sqlx(rename = "record_id")]
    #[schema(example = 42)]
    pub id: i64,
    #[schema(ignore)]
    #[serde(skip)]
    pub clinic_tag: String,
    /// Hora do check-in (epoch em segundos).
    #[sqlx(rename = "created_at")]
    #[serde(with = "chrono::serde::ts_seconds")]
    #[schema(value_type = i64, example = 1718000000)]
    pub check_in_time: DateTime<Utc>,
    pub chart_num: Option<String>,
    pub patient_name: Option<String>,
    pub op_readiness: OpReadiness,
    #[schema(value_type = Vec<TreatmentSlot>)]
    pub treatments: Json<Vec<TreatmentSlot>>,
    pub treatment_room: Option<i32>,
    pub doctor: Option<String>,
    pub anesthesia_note: Option<String>,
    pub skincare_specialist_1: Option<String>,
    pub skincare_specialist_2: Option<String>,
    pub nursing_staff_1: Option<String>,
    pub nursing_staff_2: Option<String>,
    pub coordinator: Option<String>,
    pub consultant: Option<String>,
    pub comment_caution: Option<String>,
    pub patient_care_room: Option<String>,
    pub locking_user: Option<i64>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub delete_yn: bool,
}

impl ChartRecord {
    /// Trava vista por `requester` no instante `now`.
    pub fn lock_state(&self, requester: i64, now: DateTime<Utc>) -> LockState {
        LockState::of(self.locking_user, self.lock_expires_at, requester, now)
    }

    /// Número (1-based) do primeiro tratamento que satisfaz `pred`.
    pub fn find_slot(&self, pred: impl Fn(&TreatmentSlot) -> bool) -> Option<usize> {
        self.treatments
            .iter()
            .position(pred)
            .map(|index| index + 1)
    }

    pub fn slot_mut(&mut self, number: usize) -> Option<&mut TreatmentSlot> {
        number
            .checked_sub(1)
            .and_then(|index| self.treatments.0.get_mut(index))
    }

    pub fn has_unready_treatments(&self) -> bool {
        self.treatments.iter().any(TreatmentSlot::can_be_readied)
    }

    pub fn has_waiting_treatments(&self) -> bool {
        self.treatments.iter().any(TreatmentSlot::can_be_started)
    }
}

/// Campos editáveis de um prontuário, compartilhados por inserção e atualização.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    #[validate(length(max = 15))]
    #[schema(example = "C-000123")]
    pub chart_num: Option<String>,
    #[validate(length(max = 100))]
    #[schema(example = "Hong Gildong")]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub op_readiness: OpReadiness,
    #[serde(default)]
    #[validate(length(max = 5, message = "No máximo 5 tratamentos."), nested)]
    pub treatments: Vec<TreatmentSlot>,
    pub treatment_room: Option<i32>,
    #[validate(length(max = 50))]
    pub doctor: Option<String>,
    #[validate(length(max = 300))]
    pub anesthesia_note: Option<String>,
    #[validate(length(max = 50))]
    pub skincare_specialist_1: Option<String>,
    #[validate(length(max = 50))]
    pub skincare_specialist_2: Option<String>,
    #[validate(length(max = 50))]
    pub nursing_staff_1: Option<String>,
    #[validate(length(max = 50))]
    pub nursing_staff_2: Option<String>,
    #[validate(length(max = 50))]
    pub coordinator: Option<String>,
    #[validate(length(max = 50))]
    pub consultant: Option<String>,
    #[validate(length(max = 300))]
    pub comment_caution: Option<String>,
    #[validate(length(max = 50))]
    pub patient_care_room: Option<String>,
}

impl From<ChartRecord> for RecordFields {
    fn from(record: ChartRecord) -> Self {
        Self {
            chart_num: record.chart_num,
            patient_name: record.patient_name,
            op_readiness: record.op_readiness,
            treatments: record.treatments.0,
            treatment_room: record.treatment_room,
            doctor: record.doctor,
            anesthesia_note: record.anesthesia_note,
            skincare_specialist_1: record.skincare_specialist_1,
            skincare_specialist_2: record.skincare_specialist_2,
            nursing_staff_1: record.nursing_staff_1,
            nursing_staff_2: record.nursing_staff_2,
            coordinator: record.coordinator,
            consultant: record.consultant,
            comment_caution: record.comment_caution,
            patient_care_room: record.patient_care_room,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    #[schema(example = 42)]
    pub id: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: RecordFields,
}

// --- Travas ---

/// Situação da trava de um registro do ponto de vista de quem pede.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Free,
    HeldBySelf,
    /// Havia dono, mas o lease venceu.
    Expired,
    HeldByOther(i64),
}

impl LockState {
    pub fn of(
        holder: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
        requester: i64,
        now: DateTime<Utc>,
    ) -> Self {
        match holder {
            None => LockState::Free,
            Some(user) if user == requester => LockState::HeldBySelf,
            Some(user) => match expires_at {
                Some(at) if at <= now => LockState::Expired,
                _ => LockState::HeldByOther(user),
            },
        }
    }

    pub fn permits(self) -> bool {
        !matches!(self, LockState::HeldByOther(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockConflict {
    pub record_id: i64,
    pub locking_user: i64,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub lock_expires_at: Option<DateTime<Utc>>,
}

// --- Filtros de listagem ---

/// Predicado acrescentado à consulta de listagem (sempre em AND).
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordFilter {
    /// Ready → `Y`; ExceptReady → tudo menos `Y`; Archive não restringe.
    #[serde(rename_all = "camelCase")]
    Table { table: TableType },
    Readiness { values: Vec<OpReadiness> },
    CheckedInSince {
        #[serde(with = "chrono::serde::ts_seconds")]
        #[schema(value_type = i64)]
        at: DateTime<Utc>,
    },
    CheckedInBefore {
        #[serde(with = "chrono::serde::ts_seconds")]
        #[schema(value_type = i64)]
        at: DateTime<Utc>,
    },
    ChartNum { value: String },
    PatientNameContains { value: String },
    /// `userId: null` seleciona registros sem trava.
    #[serde(rename_all = "camelCase")]
    LockedBy { user_id: Option<i64> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn slot(treatment: &str) -> TreatmentSlot {
        TreatmentSlot {
            treatment: Some(treatment.to_string()),
            quantity: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn lock_state_covers_every_case() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        let earlier = now - Duration::seconds(1);

        assert_eq!(LockState::of(None, None, 1, now), LockState::Free);
        assert_eq!(LockState::of(Some(1), Some(later), 1, now), LockState::HeldBySelf);
        assert_eq!(LockState::of(Some(2), Some(later), 1, now), LockState::HeldByOther(2));
        assert_eq!(LockState::of(Some(2), Some(earlier), 1, now), LockState::Expired);
        assert!(LockState::Expired.permits());
        assert!(!LockState::HeldByOther(2).permits());
    }

    #[test]
    fn slot_predicates_follow_the_workflow() {
        let mut s = slot("laser");
        assert!(s.can_be_readied());
        assert!(!s.can_be_started());

        s.ready_at = Some(Utc::now());
        assert!(s.can_be_started());
        assert!(!s.can_be_completed());

        s.start_at = Some(Utc::now());
        assert!(s.can_be_completed());

        s.end_at = Some(Utc::now());
        assert!(!s.can_be_completed());
        assert!(!TreatmentSlot::default().can_be_readied());
    }

    #[test]
    fn readiness_uses_single_letter_codes() {
        assert_eq!(json!(OpReadiness::InProgress), json!("P"));
        let parsed: OpReadiness = serde_json::from_value(json!("C")).unwrap();
        assert_eq!(parsed, OpReadiness::Complete);
    }

    #[test]
    fn slot_times_travel_as_epoch_seconds() {
        let parsed: TreatmentSlot = serde_json::from_value(json!({
            "treatment": "laser",
            "quantity": 2,
            "readyAt": 1718000000
        }))
        .unwrap();

        assert_eq!(parsed.ready_at.unwrap().timestamp(), 1718000000);
        assert!(parsed.start_at.is_none());
        assert_eq!(json!(parsed)["readyAt"], 1718000000);
    }

    #[test]
    fn record_fields_reject_more_than_five_treatments() {
        let fields = RecordFields {
            treatments: (0..6).map(|i| slot(&format!("t{i}"))).collect(),
            ..Default::default()
        };
        assert!(fields.validate().is_err());

        let fields = RecordFields {
            treatments: (0..5).map(|i| slot(&format!("t{i}"))).collect(),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn filters_deserialize_from_tagged_json() {
        let filters: Vec<RecordFilter> = serde_json::from_value(json!([
            { "kind": "table", "table": "Ready" },
            { "kind": "readiness", "values": ["N", "P"] },
            { "kind": "checkedInSince", "at": 1718000000 },
            { "kind": "lockedBy", "userId": null }
        ]))
        .unwrap();

        assert!(matches!(filters[0], RecordFilter::Table { table: TableType::Ready }));
        assert!(matches!(&filters[1], RecordFilter::Readiness { values } if values.len() == 2));
        assert!(matches!(filters[3], RecordFilter::LockedBy { user_id: None }));
    }
}
