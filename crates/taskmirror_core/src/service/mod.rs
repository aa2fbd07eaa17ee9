//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep CLI callers decoupled from storage and tracking details.
//!
//! # See also
//! - `crate::sync` for bulk transfer, which bypasses tracking

pub mod task_service;
