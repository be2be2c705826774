// src/state.rs

use axum::extract::FromRef;

use crate::{config::Config, imagehost::ImageHost, session::SessionRegistry, store::Stores};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub sessions: SessionRegistry,
    pub images: ImageHost,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let sessions = SessionRegistry::new(stores.clone(), config.run_configuration());
        let images = ImageHost::from_config(&config);

        Self {
            config,
            stores,
            sessions,
            images,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Stores {
    fn from_ref(state: &AppState) -> Self {
        state.stores.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for ImageHost {
    fn from_ref(state: &AppState) -> Self {
        state.images.clone()
    }
}
