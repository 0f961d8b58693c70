// src/services.rs

pub mod auth;
pub mod lock_reaper;
pub mod record_service;
pub mod workflow;
