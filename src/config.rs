// src/config.rs

use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    common::i18n::I18nStore,
    db::{RecordRepository, TreatmentRepository, UserRepository},
    services::{auth::AuthService, record_service::RecordService},
    ws::RoomRegistry,
};

/// Configuração lida do ambiente (e do `.env`, se existir).
///
/// | Variável                  | Padrão    |
/// |---------------------------|-----------|
/// | `DATABASE_URL`            | obrigatória |
/// | `JWT_SECRET`              | obrigatória |
/// | `HOST`                    | `0.0.0.0` |
/// | `PORT`                    | `5000`    |
/// | `DB_MAX_CONNECTIONS`      | `5`       |
/// | `JWT_EXPIRY_DAYS`         | `7`       |
/// | `LOCK_LEASE_SECS`         | `300`     |
/// | `LOCK_REAP_INTERVAL_SECS` | `30`      |
/// | `WS_HEARTBEAT_SECS`       | `30`      |
const MAX_LOCK_LEASE_SECS: i64 = 86_400;
const MAX_INTERVAL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_expiry_days: i64,
    pub lock_lease: chrono::Duration,
    pub lock_reap_interval: Duration,
    pub ws_heartbeat: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de busca qualquer.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        Ok(Self {
            database_url,
            jwt_secret,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 5000)?,
            db_max_connections: parse_in_range(&lookup, "DB_MAX_CONNECTIONS", 5, 1..=1000)?,
            jwt_expiry_days: parse_in_range(&lookup, "JWT_EXPIRY_DAYS", 7, 1..=365)?,
            lock_lease: chrono::Duration::seconds(parse_in_range(
                &lookup,
                "LOCK_LEASE_SECS",
                300,
                1..=MAX_LOCK_LEASE_SECS,
            )?),
            lock_reap_interval: Duration::from_secs(parse_in_range(
                &lookup,
                "LOCK_REAP_INTERVAL_SECS",
                30,
                1..=MAX_INTERVAL_SECS,
            )?),
            ws_heartbeat: Duration::from_secs(parse_in_range(
                &lookup,
                "WS_HEARTBEAT_SECS",
                30,
                1..=MAX_INTERVAL_SECS,
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} inválido: {raw:?}")),
        None => Ok(default),
    }
}

/// Como `parse_or`, mas fora de `range` também é erro de inicialização.
fn parse_in_range<F, T>(
    lookup: &F,
    key: &str,
    default: T,
    range: RangeInclusive<T>,
) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_or(lookup, key, default)?;
    anyhow::ensure!(
        range.contains(&value),
        "{key} deve estar entre {} e {}: {value}",
        range.start(),
        range.end()
    );
    Ok(value)
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub auth_service: AuthService,
    pub record_service: RecordService,
    pub user_repo: UserRepository,
    pub treatment_repo: TreatmentRepository,
    pub rooms: Arc<RoomRegistry>,
    pub i18n_store: Arc<I18nStore>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, config))
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_pool(db_pool: PgPool, config: Config) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let record_repo = RecordRepository::new(db_pool.clone());
        let treatment_repo = TreatmentRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            user_repo.clone(),
            db_pool.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiry_days,
        );
        let record_service = RecordService::new(record_repo, db_pool.clone(), config.lock_lease);

        Self {
            db_pool,
            config: Arc::new(config),
            auth_service,
            record_service,
            user_repo,
            treatment_repo,
            rooms: Arc::new(RoomRegistry::new()),
            i18n_store: Arc::new(I18nStore::default()),
        }
    }
}
