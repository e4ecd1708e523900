use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::session::SessionManager;
use crate::config::Config;
use crate::social::{DynSocialRepository, SqliteSocialRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionManager>,
    pub repo: DynSocialRepository,
}

impl AppState {
    pub fn new(config: Config, sessions: SessionManager, pool: DbPool) -> Self {
        Self {
            config,
            sessions: Arc::new(sessions),
            repo: Arc::new(SqliteSocialRepository::new(pool)),
        }
    }
}
