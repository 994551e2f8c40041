use crate::journal::JournalService;
use crate::storage::FileJournal;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub journal: Arc<JournalService<FileJournal>>,
}

impl AppState {
    pub fn new(journal: JournalService<FileJournal>) -> Self {
        Self {
            journal: Arc::new(journal),
        }
    }
}
