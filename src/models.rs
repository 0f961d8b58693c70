// src/models.rs

pub mod auth;
pub mod record;
pub mod treatment;
