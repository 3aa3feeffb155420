use crate::configs::Config;
use crate::recording::RecordingStore;
use crate::rooms::RoomDirectory;
use crate::server::registry::ConnectionRegistry;

/// Top-level application state.
pub struct AppState {
    pub rooms: RoomDirectory,
    pub registry: ConnectionRegistry,
    pub store: RecordingStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: RoomDirectory::new(),
            registry: ConnectionRegistry::new(),
            store: RecordingStore::new(config.recording.directory.clone()),
            config,
        }
    }
}
