// src/middleware.rs

pub mod auth;
pub mod clinic;
pub mod i18n;
