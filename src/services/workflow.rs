// src/services/workflow.rs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    models::record::{ChartRecord, OpReadiness, TreatmentSlot},
};

/// Ação de fluxo aplicada a um tratamento do prontuário.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreatmentAction {
    MarkReady,
    Start,
    Complete,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentActionPayload {
    #[schema(example = 42)]
    pub record_id: i64,
    /// Número do tratamento (1 a 5). Quando ausente, o servidor escolhe.
    #[schema(example = 1)]
    pub treatment_number: Option<usize>,
}

impl TreatmentAction {
    fn slot_allows(self, slot: &TreatmentSlot) -> bool {
        match self {
            TreatmentAction::MarkReady => slot.can_be_readied(),
            TreatmentAction::Start => slot.can_be_started(),
            TreatmentAction::Complete => slot.can_be_completed(),
        }
    }

    fn check_readiness(self, readiness: OpReadiness) -> Result<(), AppError> {
        let reason = match (self, readiness) {
            (TreatmentAction::MarkReady, OpReadiness::InProgress) => "treatment in progress",
            (TreatmentAction::MarkReady, OpReadiness::Complete) => "all treatments complete",
            (TreatmentAction::Start, OpReadiness::Ready) => return Ok(()),
            (TreatmentAction::Start, _) => "record is not ready",
            (TreatmentAction::Complete, OpReadiness::InProgress) => return Ok(()),
            (TreatmentAction::Complete, _) => "no treatment in progress",
            _ => return Ok(()),
        };
        Err(AppError::InvalidTransition(reason.to_string()))
    }
}

/// Aplica a ação no registro em memória e devolve o número do tratamento afetado.
///
/// `N`/`Y` → `Y` ao preparar; `Y` → `P` ao iniciar; ao concluir, `P` vai para
/// `Y` se ainda houver tratamento preparado esperando, `N` se houver algum sem
/// preparo, senão `C`.
pub fn apply_action(
    record: &mut ChartRecord,
    action: TreatmentAction,
    treatment_number: Option<usize>,
    operator: &str,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    action.check_readiness(record.op_readiness)?;

    let number = match treatment_number {
        Some(n) => n,
        None => record
            .find_slot(|slot| action.slot_allows(slot))
            .ok_or_else(|| AppError::InvalidTransition("no eligible treatment".to_string()))?,
    };

    let slot = record
        .slot_mut(number)
        .ok_or_else(|| AppError::BadRequest(format!("treatment {number} does not exist")))?;

    if !action.slot_allows(slot) {
        return Err(AppError::InvalidTransition(format!(
            "treatment {number} cannot be changed by {action:?}"
        )));
    }

    match action {
        TreatmentAction::MarkReady => {
            slot.ready_at = Some(now);
            record.op_readiness = OpReadiness::Ready;
        }
        TreatmentAction::Start => {
            slot.start_at = Some(now);
            record.op_readiness = OpReadiness::InProgress;
            record.doctor = Some(operator.to_string());
        }
        TreatmentAction::Complete => {
            slot.end_at = Some(now);
            record.doctor = None;
            record.op_readiness = if record.has_waiting_treatments() {
                OpReadiness::Ready
            } else if record.has_unready_treatments() {
                OpReadiness::NotReady
            } else {
                OpReadiness::Complete
            };
        }
    }

    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn record(slots: Vec<TreatmentSlot>) -> ChartRecord {
        ChartRecord {
            id: 1,
            clinic_tag: "gangnam".into(),
            check_in_time: Utc::now(),
            chart_num: Some("C-1".into()),
            patient_name: Some("Hong".into()),
            op_readiness: OpReadiness::NotReady,
            treatments: Json(slots),
            treatment_room: None,
            doctor: None,
            anesthesia_note: None,
            skincare_specialist_1: None,
            skincare_specialist_2: None,
            nursing_staff_1: None,
            nursing_staff_2: None,
            coordinator: None,
            consultant: None,
            comment_caution: None,
            patient_care_room: None,
            locking_user: None,
            lock_expires_at: None,
            delete_yn: false,
        }
    }

    fn slot(name: &str) -> TreatmentSlot {
        TreatmentSlot {
            treatment: Some(name.to_string()),
            quantity: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn single_treatment_walks_n_y_p_c() {
        let now = Utc::now();
        let mut rec = record(vec![slot("laser")]);

        assert_eq!(apply_action(&mut rec, TreatmentAction::MarkReady, None, "7", now).unwrap(), 1);
        assert_eq!(rec.op_readiness, OpReadiness::Ready);

        apply_action(&mut rec, TreatmentAction::Start, None, "7", now).unwrap();
        assert_eq!(rec.op_readiness, OpReadiness::InProgress);
        assert_eq!(rec.doctor.as_deref(), Some("7"));

        apply_action(&mut rec, TreatmentAction::Complete, None, "7", now).unwrap();
        assert_eq!(rec.op_readiness, OpReadiness::Complete);
        assert!(rec.doctor.is_none());
        assert!(rec.treatments[0].end_at.is_some());
    }

    #[test]
    fn completing_with_unready_slots_goes_back_to_not_ready() {
        let now = Utc::now();
        let mut rec = record(vec![slot("laser"), slot("botox")]);

        apply_action(&mut rec, TreatmentAction::MarkReady, Some(1), "7", now).unwrap();
        apply_action(&mut rec, TreatmentAction::Start, None, "7", now).unwrap();
        apply_action(&mut rec, TreatmentAction::Complete, None, "7", now).unwrap();

        assert_eq!(rec.op_readiness, OpReadiness::NotReady);
    }

    #[test]
    fn completing_with_a_readied_slot_waiting_stays_ready() {
        let now = Utc::now();
        let mut rec = record(vec![slot("laser"), slot("botox")]);

        apply_action(&mut rec, TreatmentAction::MarkReady, Some(1), "7", now).unwrap();
        apply_action(&mut rec, TreatmentAction::MarkReady, Some(2), "7", now).unwrap();
        apply_action(&mut rec, TreatmentAction::Start, Some(1), "7", now).unwrap();
        apply_action(&mut rec, TreatmentAction::Complete, Some(1), "7", now).unwrap();

        assert_eq!(rec.op_readiness, OpReadiness::Ready);
    }

    #[test]
    fn cannot_mark_ready_while_in_progress() {
        let now = Utc::now();
        let mut rec = record(vec![slot("laser"), slot("botox")]);
        rec.op_readiness = OpReadiness::InProgress;

        let err = apply_action(&mut rec, TreatmentAction::MarkReady, None, "7", now).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn starting_a_not_ready_record_is_rejected() {
        let mut rec = record(vec![slot("laser")]);
        let err = apply_action(&mut rec, TreatmentAction::Start, None, "7", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn unknown_treatment_number_is_a_bad_request() {
        let mut rec = record(vec![slot("laser")]);
        let err =
            apply_action(&mut rec, TreatmentAction::MarkReady, Some(4), "7", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err =
            apply_action(&mut rec, TreatmentAction::MarkReady, Some(0), "7", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn empty_record_has_nothing_to_ready() {
        let mut rec = record(vec![]);
        let err = apply_action(&mut rec, TreatmentAction::MarkReady, None, "7", Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
}
