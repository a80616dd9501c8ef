mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::scan::ScanEngine;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and the injected scan engine
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub scanner: Arc<dyn ScanEngine>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
