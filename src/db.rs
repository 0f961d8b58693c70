// src/db.rs

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod record_repo;
pub use record_repo::{ExpiredLock, RecordRepository};
pub mod treatment_repo;
pub use treatment_repo::TreatmentRepository;
