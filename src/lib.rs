pub mod auth;
pub mod config;
pub mod db;
pub mod media;
pub mod web;

pub use db::DbPool;

use config::Config;
use media::MediaStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let media = MediaStore::new(config.server.static_dir.clone());
        Self { config, db, media }
    }
}
