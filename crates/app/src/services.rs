//! Application services — one per governance concern.

pub mod approval_service;
pub mod backup_service;
pub mod emergency_service;
pub mod lifecycle_service;
