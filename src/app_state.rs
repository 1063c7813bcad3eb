use std::sync::Arc;

use crate::{
    config::AppConfig,
    generator::{self, MindMapGenerator, SummaryPipeline},
    llm::{Completer, LlmManager},
    store::MindMapStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub llm_manager: LlmManager,
    pub generator: Arc<dyn MindMapGenerator>,
    pub summarizer: SummaryPipeline,
    pub store: Arc<dyn MindMapStore>,
}

impl AppState {
    /// `completer` alimenta a todas las etapas del pipeline; `llm_manager`
    /// queda para la transcripción de audio.
    pub fn new(
        config: AppConfig,
        llm_manager: LlmManager,
        completer: Arc<dyn Completer>,
        store: Arc<dyn MindMapStore>,
    ) -> Self {
        Self {
            generator: generator::from_config(&config, completer.clone()),
            summarizer: SummaryPipeline::new(completer),
            config,
            llm_manager,
            store,
        }
    }
}
