use std::sync::Arc;

use tokio::sync::RwLock;

use crate::analyze::Analyzer;
use crate::api::routes::most_play_with::AnalyzerState;
use crate::cache::TargetRepository;
use crate::schedule::AdmissionController;

#[derive(Clone)]
pub struct AppState {
    pub admission: AdmissionController,
    pub analyzer: Arc<Analyzer>,
    pub analyzer_state: Arc<RwLock<AnalyzerState>>,
}

impl AppState {
    pub fn new(admission: AdmissionController, analyzer: Analyzer) -> Self {
        Self {
            admission,
            analyzer: Arc::new(analyzer),
            analyzer_state: Arc::new(RwLock::new(AnalyzerState::default())),
        }
    }

    pub fn repo(&self) -> &TargetRepository {
        self.admission.repo()
    }
}
