pub mod access;
pub mod admin;
pub mod configuration;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod importexport;
pub mod lifecycle;
pub mod mentions;
pub mod notify;
pub mod repo;
pub mod search;
pub mod telemetry;
