pub mod config;
pub mod debounce;
pub mod events;
pub mod player;
pub mod playlist;
pub mod tasks {
    pub mod files;
    pub mod inputs;
    pub mod orchestrator;
}
