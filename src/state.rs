use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::store::{CoverImageStore, PostStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub posts: Arc<PostStore>,
    pub images: Arc<CoverImageStore>,
    pub sessions: Arc<Mutex<SessionStore>>,
}
