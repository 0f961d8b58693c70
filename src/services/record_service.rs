// src/services/record_service.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{ExpiredLock, RecordRepository},
    models::{
        auth::{User, UserRole},
        record::{ChartRecord, LockConflict, LockState, RecordFields, RecordFilter, RecordUpdate},
    },
    services::workflow::{self, TreatmentAction},
};

#[derive(Clone)]
pub struct RecordService {
    repo: RecordRepository,
    pool: PgPool,
    lock_lease: chrono::Duration,
}

impl RecordService {
    /// `lock_lease` já vem limitado pela `Config`.
    pub fn new(repo: RecordRepository, pool: PgPool, lock_lease: chrono::Duration) -> Self {
        Self {
            repo,
            pool,
            lock_lease,
        }
    }

    pub fn lease_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lock_lease
    }

    // --- CRUD ---

    /// Insere o lote inteiro ou nada.
    pub async fn insert_records(
        &self,
        clinic_tag: &str,
        records: &[RecordFields],
    ) -> Result<Vec<ChartRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        let inserted = self.repo.insert_records(&mut *tx, clinic_tag, records).await?;
        tx.commit().await?;

        tracing::info!(clinic = clinic_tag, count = inserted.len(), "Registros inseridos");
        Ok(inserted)
    }

    /// Salva o registro e libera a trava de quem editou.
    pub async fn update_record(
        &self,
        clinic_tag: &str,
        editor: &User,
        update: &RecordUpdate,
    ) -> Result<ChartRecord, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // A linha fica presa: a trava vista aqui é a mesma que a escrita encontra
        let current = self
            .repo
            .find_for_update(&mut *tx, clinic_tag, update.id)
            .await?
            .ok_or(AppError::RecordNotFound(update.id))?;
        let conflicts = lock_conflicts(std::slice::from_ref(&current), editor.id, now);
        if !conflicts.is_empty() {
            return Err(AppError::RecordLocked(conflicts));
        }

        let saved = self
            .repo
            .update_record(&mut *tx, clinic_tag, editor.id, update, now)
            .await?
            .ok_or(AppError::RecordNotFound(update.id))?;
        tx.commit().await?;

        Ok(saved)
    }

    pub async fn list_records(
        &self,
        clinic_tag: &str,
        filters: &[RecordFilter],
    ) -> Result<Vec<ChartRecord>, AppError> {
        self.repo.list_records(&self.pool, clinic_tag, filters).await
    }

    /// Exclusão lógica tudo-ou-nada: se algum id estiver travado por outro
    /// usuário nada é ocultado. Ids inexistentes são ignorados.
    pub async fn hide_records(
        &self,
        clinic_tag: &str,
        requester: &User,
        ids: &[i64],
    ) -> Result<Vec<i64>, AppError> {
        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current = self
            .repo
            .find_many_for_update(&mut *tx, clinic_tag, &ids)
            .await?;
        let conflicts = lock_conflicts(&current, requester.id, now);
        if !conflicts.is_empty() {
            return Err(AppError::RecordLocked(conflicts));
        }

        let hidden = self
            .repo
            .hide_records(&mut *tx, clinic_tag, &ids, requester.id, now)
            .await?;
        tx.commit().await?;

        tracing::info!(clinic = clinic_tag, user_id = requester.id, ?hidden, "Registros ocultados");
        Ok(hidden)
    }

    // --- TRAVAS ---

    /// `locking_user = Some(eu)` trava, `None` destrava. `force` só para admin.
    pub async fn lock_records(
        &self,
        clinic_tag: &str,
        requester: &User,
        ids: &[i64],
        locking_user: Option<i64>,
        force: bool,
    ) -> Result<Vec<ChartRecord>, AppError> {
        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();

        if force {
            if requester.user_role != UserRole::Admin {
                return Err(AppError::Forbidden("force requires admin".to_string()));
            }
            let expires_at = locking_user.map(|_| self.lease_expiry(now));
            let written = self
                .repo
                .force_locks(&self.pool, clinic_tag, &ids, locking_user, expires_at)
                .await?;

            tracing::warn!(
                clinic = clinic_tag,
                admin_id = requester.id,
                holder = ?locking_user,
                records = ?ids,
                "Trava sobrescrita à força"
            );
            return Ok(written);
        }

        match locking_user {
            Some(user_id) if user_id == requester.id => {
                self.acquire(clinic_tag, requester.id, &ids, now).await
            }
            Some(_) => Err(AppError::Forbidden(
                "cannot lock on behalf of another user".to_string(),
            )),
            None => {
                let released = self
                    .repo
                    .release_locks(&self.pool, clinic_tag, &ids, requester.id, now)
                    .await?;
                if released.len() < ids.len() {
                    tracing::debug!(
                        clinic = clinic_tag,
                        user_id = requester.id,
                        requested = ids.len(),
                        released = released.len(),
                        "Algumas travas pertencem a outros usuários"
                    );
                }
                Ok(released)
            }
        }
    }

    async fn acquire(
        &self,
        clinic_tag: &str,
        user_id: i64,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Vec<ChartRecord>, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = self
            .repo
            .acquire_locks(&mut *tx, clinic_tag, ids, user_id, now, self.lease_expiry(now))
            .await?;

        if locked.len() == ids.len() {
            tx.commit().await?;
            tracing::debug!(clinic = clinic_tag, user_id, records = ?ids, "Travas adquiridas");
            return Ok(locked);
        }

        // Alguma linha ficou de fora: a transação é descartada (rollback no drop)
        let current = self.repo.find_many(&mut *tx, clinic_tag, ids).await?;
        let conflicts = lock_conflicts(&current, user_id, now);
        if !conflicts.is_empty() {
            tracing::info!(clinic = clinic_tag, user_id, ?conflicts, "Registro já travado");
            return Err(AppError::RecordLocked(conflicts));
        }

        let found: HashSet<i64> = current.iter().map(|r| r.id).collect();
        let missing = ids.iter().copied().find(|id| !found.contains(id)).unwrap_or(ids[0]);
        Err(AppError::RecordNotFound(missing))
    }

    // --- FLUXO DE TRATAMENTO ---

    /// Aplica a transição e salva; a trava de quem operou é liberada.
    pub async fn apply_treatment_action(
        &self,
        clinic_tag: &str,
        operator: &User,
        action: TreatmentAction,
        record_id: i64,
        treatment_number: Option<usize>,
    ) -> Result<ChartRecord, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut record = self
            .repo
            .find_for_update(&mut *tx, clinic_tag, record_id)
            .await?
            .ok_or(AppError::RecordNotFound(record_id))?;

        if !record.lock_state(operator.id, now).permits() {
            return Err(AppError::RecordLocked(lock_conflicts(
                std::slice::from_ref(&record),
                operator.id,
                now,
            )));
        }

        let number = workflow::apply_action(
            &mut record,
            action,
            treatment_number,
            &operator.id.to_string(),
            now,
        )?;

        let update = RecordUpdate {
            id: record.id,
            fields: record.into(),
        };
        let saved = self
            .repo
            .update_record(&mut *tx, clinic_tag, operator.id, &update, now)
            .await?
            .ok_or(AppError::RecordNotFound(record_id))?;
        tx.commit().await?;

        tracing::info!(
            clinic = clinic_tag,
            record_id,
            treatment = number,
            ?action,
            readiness = ?saved.op_readiness,
            "Fluxo de tratamento atualizado"
        );
        Ok(saved)
    }

    pub async fn reap_expired_locks(&self) -> Result<Vec<ExpiredLock>, AppError> {
        self.repo.reap_expired(Utc::now()).await
    }
}

/// Registros que `requester` não pode tocar agora (travados por outro, lease válido).
pub fn lock_conflicts(records: &[ChartRecord], requester: i64, now: DateTime<Utc>) -> Vec<LockConflict> {
    records
        .iter()
        .filter_map(|record| match record.lock_state(requester, now) {
            LockState::HeldByOther(holder) => Some(LockConflict {
                record_id: record.id,
                locking_user: holder,
                lock_expires_at: record.lock_expires_at,
            }),
            _ => None,
        })
        .collect()
}

fn dedupe(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
