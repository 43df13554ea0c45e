//! Index intake service: Postgres as the system of record, Redis as the
//! derived value cache and notification bus.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
