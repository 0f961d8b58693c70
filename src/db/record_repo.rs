// src/db/record_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    common::error::AppError,
    models::record::{ChartRecord, OpReadiness, RecordFields, RecordFilter, RecordUpdate, TableType},
};

/// Trava vencida que o reaper acabou de liberar.
#[derive(Debug, Clone, FromRow)]
pub struct ExpiredLock {
    pub record_id: i64,
    pub clinic_tag: String,
    pub previous_holder: i64,
}

// Repositório da tabela 'chart_schedule'.
// Toda leitura "ativa" exclui linhas com delete_yn = true.
#[derive(Clone)]
pub struct RecordRepository {
    pool: PgPool,
}

impl RecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CRUD
    // =========================================================================

    /// Insere um lote numa única instrução; o banco atribui id e check-in.
    pub async fn insert_records<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        records: &[RecordFields],
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            INSERT INTO chart_schedule (
                clinic_tag, chart_num, patient_name, op_readiness, treatments,
                treatment_room, doctor, anesthesia_note,
                skincare_specialist_1, skincare_specialist_2,
                nursing_staff_1, nursing_staff_2,
                coordinator, consultant, comment_caution, patient_care_room
            )
            "#,
        );

        qb.push_values(records, |mut row, record| {
            row.push_bind(clinic_tag.to_string())
                .push_bind(record.chart_num.clone())
                .push_bind(record.patient_name.clone())
                .push_bind(record.op_readiness)
                .push_bind(Json(record.treatments.clone()))
                .push_bind(record.treatment_room)
                .push_bind(record.doctor.clone())
                .push_bind(record.anesthesia_note.clone())
                .push_bind(record.skincare_specialist_1.clone())
                .push_bind(record.skincare_specialist_2.clone())
                .push_bind(record.nursing_staff_1.clone())
                .push_bind(record.nursing_staff_2.clone())
                .push_bind(record.coordinator.clone())
                .push_bind(record.consultant.clone())
                .push_bind(record.comment_caution.clone())
                .push_bind(record.patient_care_room.clone());
        });
        qb.push(" RETURNING *");

        let inserted = qb
            .build_query_as::<ChartRecord>()
            .fetch_all(executor)
            .await?;

        Ok(inserted)
    }

    /// Grava o registro inteiro e limpa a trava.
    ///
    /// Retorna `None` quando o id não existe, está oculto ou está travado por
    /// outro usuário com lease válido.
    pub async fn update_record<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        editor: i64,
        update: &RecordUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let fields = &update.fields;

        let updated = sqlx::query_as::<_, ChartRecord>(
            r#"
            UPDATE chart_schedule SET
                chart_num = $4,
                patient_name = $5,
                op_readiness = $6,
                treatments = $7,
                treatment_room = $8,
                doctor = $9,
                anesthesia_note = $10,
                skincare_specialist_1 = $11,
                skincare_specialist_2 = $12,
                nursing_staff_1 = $13,
                nursing_staff_2 = $14,
                coordinator = $15,
                consultant = $16,
                comment_caution = $17,
                patient_care_room = $18,
                locking_user = NULL,
                lock_expires_at = NULL
            WHERE record_id = $1
              AND clinic_tag = $2
              AND delete_yn = false
              AND (locking_user IS NULL OR locking_user = $3 OR lock_expires_at <= $19)
            RETURNING *
            "#,
        )
        .bind(update.id)
        .bind(clinic_tag)
        .bind(editor)
        .bind(&fields.chart_num)
        .bind(&fields.patient_name)
        .bind(fields.op_readiness)
        .bind(Json(&fields.treatments))
        .bind(fields.treatment_room)
        .bind(&fields.doctor)
        .bind(&fields.anesthesia_note)
        .bind(&fields.skincare_specialist_1)
        .bind(&fields.skincare_specialist_2)
        .bind(&fields.nursing_staff_1)
        .bind(&fields.nursing_staff_2)
        .bind(&fields.coordinator)
        .bind(&fields.consultant)
        .bind(&fields.comment_caution)
        .bind(&fields.patient_care_room)
        .bind(now)
        .fetch_optional(executor)
        .await?;

        Ok(updated)
    }

    /// Busca um registro ativo e segura a linha até o fim da transação.
    pub async fn find_for_update<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        id: i64,
    ) -> Result<Option<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, ChartRecord>(
            r#"
            SELECT * FROM chart_schedule
            WHERE record_id = $1 AND clinic_tag = $2 AND delete_yn = false
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(clinic_tag)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    pub async fn find_many<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query_as::<_, ChartRecord>(
            r#"
            SELECT * FROM chart_schedule
            WHERE clinic_tag = $1 AND record_id = ANY($2) AND delete_yn = false
            ORDER BY record_id
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .fetch_all(executor)
        .await?;

        Ok(records)
    }

    /// `find_many` com `FOR UPDATE`: as linhas ficam presas até o fim da
    /// transação, então nenhuma trava nova entra entre a checagem e a escrita.
    pub async fn find_many_for_update<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query_as::<_, ChartRecord>(
            r#"
            SELECT * FROM chart_schedule
            WHERE clinic_tag = $1 AND record_id = ANY($2) AND delete_yn = false
            ORDER BY record_id
            FOR UPDATE
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .fetch_all(executor)
        .await?;

        Ok(records)
    }

    /// Lista os registros ativos da clínica, acrescentando cada filtro em AND.
    pub async fn list_records<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        filters: &[RecordFilter],
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = build_list_query(clinic_tag, filters, Utc::now());
        let records = qb
            .build_query_as::<ChartRecord>()
            .fetch_all(executor)
            .await?;

        Ok(records)
    }

    /// Exclusão lógica condicional: linhas travadas por outro usuário (lease
    /// válido) ficam de fora. Devolve os ids efetivamente ocultados.
    pub async fn hide_records<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
        requester: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let hidden: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE chart_schedule
            SET delete_yn = true, locking_user = NULL, lock_expires_at = NULL
            WHERE clinic_tag = $1
              AND record_id = ANY($2)
              AND delete_yn = false
              AND (locking_user IS NULL OR locking_user = $3 OR lock_expires_at <= $4)
            RETURNING record_id
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .bind(requester)
        .bind(now)
        .fetch_all(executor)
        .await?;

        Ok(hidden)
    }

    // =========================================================================
    //  TRAVAS
    // =========================================================================

    /// Aquisição condicional: só trava linhas livres, do próprio usuário ou com
    /// lease vencido. Devolve apenas as linhas efetivamente travadas.
    pub async fn acquire_locks<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
        user_id: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let locked = sqlx::query_as::<_, ChartRecord>(
            r#"
            UPDATE chart_schedule
            SET locking_user = $3, lock_expires_at = $5
            WHERE clinic_tag = $1
              AND record_id = ANY($2)
              AND delete_yn = false
              AND (locking_user IS NULL OR locking_user = $3 OR lock_expires_at <= $4)
            RETURNING *
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .fetch_all(executor)
        .await?;

        Ok(locked)
    }

    /// Libera as travas do usuário (e as vencidas). Linhas de outros donos ficam como estão.
    pub async fn release_locks<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let released = sqlx::query_as::<_, ChartRecord>(
            r#"
            UPDATE chart_schedule
            SET locking_user = NULL, lock_expires_at = NULL
            WHERE clinic_tag = $1
              AND record_id = ANY($2)
              AND delete_yn = false
              AND (locking_user IS NULL OR locking_user = $3 OR lock_expires_at <= $4)
            RETURNING *
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .bind(user_id)
        .bind(now)
        .fetch_all(executor)
        .await?;

        Ok(released)
    }

    /// Escrita incondicional (último a escrever vence). `holder = None` destrava.
    pub async fn force_locks<'e, E>(
        &self,
        executor: E,
        clinic_tag: &str,
        ids: &[i64],
        holder: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChartRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let written = sqlx::query_as::<_, ChartRecord>(
            r#"
            UPDATE chart_schedule
            SET locking_user = $3, lock_expires_at = $4
            WHERE clinic_tag = $1 AND record_id = ANY($2) AND delete_yn = false
            RETURNING *
            "#,
        )
        .bind(clinic_tag)
        .bind(ids)
        .bind(holder)
        .bind(expires_at)
        .fetch_all(executor)
        .await?;

        Ok(written)
    }

    /// Libera todas as travas com lease vencido, em qualquer clínica.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredLock>, AppError> {
        let reaped = sqlx::query_as::<_, ExpiredLock>(
            r#"
            WITH expired AS (
                SELECT record_id, locking_user
                FROM chart_schedule
                WHERE locking_user IS NOT NULL AND lock_expires_at <= $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE chart_schedule c
            SET locking_user = NULL, lock_expires_at = NULL
            FROM expired e
            WHERE c.record_id = e.record_id
            RETURNING c.record_id, c.clinic_tag, e.locking_user AS previous_holder
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(reaped)
    }
}

// ---
// Montagem da consulta de listagem
// ---

fn build_list_query<'a>(
    clinic_tag: &str,
    filters: &[RecordFilter],
    now: DateTime<Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM chart_schedule WHERE clinic_tag = ");
    qb.push_bind(clinic_tag.to_string());
    qb.push(" AND delete_yn = false");

    for filter in filters {
        push_filter(&mut qb, filter, now);
    }

    qb.push(" ORDER BY created_at ASC, record_id ASC");
    qb
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter, now: DateTime<Utc>) {
    match filter {
        RecordFilter::Table { table } => match table {
            TableType::Ready => {
                qb.push(" AND op_readiness = ").push_bind(OpReadiness::Ready);
            }
            TableType::ExceptReady => {
                qb.push(" AND op_readiness <> ").push_bind(OpReadiness::Ready);
            }
            TableType::Archive => {}
        },
        RecordFilter::Readiness { values } => {
            if values.is_empty() {
                qb.push(" AND false");
                return;
            }
            qb.push(" AND op_readiness IN (");
            let mut separated = qb.separated(", ");
            for value in values {
                separated.push_bind(*value);
            }
            separated.push_unseparated(")");
        }
        RecordFilter::CheckedInSince { at } => {
            qb.push(" AND created_at >= ").push_bind(*at);
        }
        RecordFilter::CheckedInBefore { at } => {
            qb.push(" AND created_at < ").push_bind(*at);
        }
        RecordFilter::ChartNum { value } => {
            qb.push(" AND chart_num = ").push_bind(value.clone());
        }
        RecordFilter::PatientNameContains { value } => {
            qb.push(" AND patient_name ILIKE ")
                .push_bind(format!("%{}%", escape_like(value)));
        }
        RecordFilter::LockedBy { user_id: Some(user) } => {
            qb.push(" AND locking_user = ")
                .push_bind(*user)
                .push(" AND lock_expires_at > ")
                .push_bind(now);
        }
        RecordFilter::LockedBy { user_id: None } => {
            qb.push(" AND (locking_user IS NULL OR lock_expires_at <= ")
                .push_bind(now)
                .push(")");
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
