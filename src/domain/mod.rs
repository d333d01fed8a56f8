//! Core domain models

pub mod auth;
