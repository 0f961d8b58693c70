// src/handlers.rs

pub mod auth;
pub mod catalog;
pub mod records;
