use caseforge_core::Pipeline;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub mod config;
pub mod handlers;
pub mod models;
pub mod storage;

pub type DbConnection = Arc<Mutex<Connection>>;

/// Shared state handed to every handler
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}
