//! Durable persistence (C11): the `prompt_history` table, its repository
//! interface, and the SQLite-backed implementation.

pub mod repository;
pub mod schema;

pub use repository::{PromptRecord, RecordFilters, Repository, SharedRepository, SqliteRepository, Statistics};
