use std::sync::Arc;

use crate::{config::Config, service::CommentService, store::CommentStore};

#[derive(Clone)]
pub struct AppState {
    pub service: CommentService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = CommentStore::connect(&config.database.url).await?;
        store.init().await?;
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Wires an already-initialized store, e.g. an in-memory database in
    /// tests.
    pub fn with_store(store: Arc<CommentStore>, config: Config) -> Self {
        let service = CommentService::new(store, config.page_defaults());
        Self { service, config }
    }
}
