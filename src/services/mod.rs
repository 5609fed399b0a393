pub mod chat;
pub mod classifier;
pub mod collection;
pub mod enrich;

use std::sync::Arc;

use crate::config::CollectionConfig;
use crate::db::Store;
use crate::llm::ChatModel;
use crate::providers::SourceAggregator;
use chat::ChatService;
use collection::CollectionService;
use enrich::EnrichService;

#[derive(Clone)]
pub struct AppState {
    pub collection_service: Arc<CollectionService>,
    pub chat_service: Arc<ChatService>,
    pub enrich_service: Arc<EnrichService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Option<Arc<dyn ChatModel>>,
        aggregator: SourceAggregator,
        config: CollectionConfig,
    ) -> Self {
        Self {
            collection_service: Arc::new(CollectionService::new(
                store.clone(),
                aggregator,
                llm.clone(),
                config,
            )),
            chat_service: Arc::new(ChatService::new(store.clone(), llm.clone())),
            enrich_service: Arc::new(EnrichService::new(store, llm)),
        }
    }
}
