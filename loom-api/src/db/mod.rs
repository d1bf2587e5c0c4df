//! Database access for the API service
//!
//! Per-table query modules over the shared pool. Pool creation and schema
//! live in `loom_common::db`; everything here is plain CRUD with explicit
//! binds, one transactional statement per call.

pub mod dreams;
pub mod interpretations;
pub mod sessions;
pub mod users;
