pub mod app;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod journal;
pub mod models;
pub mod stats;
pub mod storage;
pub mod state;

pub use app::router;
pub use config::Config;
pub use journal::JournalService;
pub use state::AppState;
pub use storage::{FileJournal, JournalStore, MemoryJournal};
