pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    broadcast::QuizHub, collab_service::CollabService, presence::PresenceRegistry,
    quiz_service::QuizService, result_service::ResultService, session_service::SessionService,
};
use crate::store::{ContentStore, MemoryStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session_service: SessionService,
    pub collab_service: CollabService,
    pub quiz_service: QuizService,
    pub result_service: ResultService,
}

impl AppState {
    pub fn new(config: Config, content: Arc<dyn ContentStore>, sessions: Arc<dyn SessionStore>) -> Self {
        let ttl = chrono::Duration::hours(config.session_ttl_hours);
        let presence = Arc::new(PresenceRegistry::new());
        let hub = Arc::new(QuizHub::new(config.broadcast_capacity));

        let session_service = SessionService::new(content.clone(), sessions.clone(), ttl);
        let collab_service = CollabService::new(content.clone(), presence, hub);
        let quiz_service = QuizService::new(content, collab_service.clone());
        let result_service = ResultService::new(sessions);

        Self {
            config: Arc::new(config),
            session_service,
            collab_service,
            quiz_service,
            result_service,
        }
    }

    /// Both stores backed by one process-local [`MemoryStore`].
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }
}
