pub mod api;
pub mod config;
pub mod db;
pub mod filter;
pub mod utils;
pub mod validation;

pub use db::DbPool;

use config::Config;

use crate::api::auth::SessionKeys;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let sessions = SessionKeys::new(&config.auth);
        Self {
            config,
            db,
            sessions,
        }
    }
}
