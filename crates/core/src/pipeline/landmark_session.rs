//! Wires the coordinator, the lifecycle manager and the event actor around
//! one shared [`DetectionGate`].

use std::io::ErrorKind;
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::config::{ConfigError, SessionConfig};
use crate::detection::domain::analysis_port::AnalysisPort;
use crate::detection::domain::event_sink::EventSink;
use crate::models::domain::model_loader::ModelLoader;
use crate::models::domain::transfer::{Downloader, Extractor};
use crate::models::lifecycle_manager::{Activation, LifecycleError, ModelLifecycleManager};
use crate::models::model_store::ModelStore;
use crate::models::registry::{CatalogueError, ModelRegistry};
use crate::pipeline::detection_coordinator::DetectionCoordinator;
use crate::pipeline::event_actor::EventActor;
use crate::shared::detection_gate::DetectionGate;
use crate::shared::frame::FrameGeometry;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// External collaborators a session is built from.
pub struct Collaborators {
    pub analysis: Arc<dyn AnalysisPort>,
    pub loader: Arc<dyn ModelLoader>,
    pub downloader: Arc<dyn Downloader>,
    pub extractor: Arc<dyn Extractor>,
    pub sink: Box<dyn EventSink>,
}

pub type ActivationHandle = JoinHandle<Result<Activation, LifecycleError>>;

pub struct LandmarkSession {
    gate: Arc<DetectionGate>,
    coordinator: Arc<DetectionCoordinator>,
    manager: Arc<ModelLifecycleManager>,
    actor: Option<EventActor>,
}

impl LandmarkSession {
    /// Builds a session. The catalogue is read from the model directory's
    /// cached `models.json` when present; otherwise it starts empty until
    /// refreshed with [`ModelLifecycleManager::replace_catalogue`].
    pub fn start(
        config: &SessionConfig,
        collaborators: Collaborators,
        geometry: FrameGeometry,
    ) -> Result<Self, SessionError> {
        let Collaborators {
            analysis,
            loader,
            downloader,
            extractor,
            sink,
        } = collaborators;

        let store = ModelStore::new(config.resolved_model_dir()?, downloader, extractor);
        let registry = load_cached_catalogue(&store);
        Self::assemble(config, store, registry, analysis, loader, sink, geometry)
    }

    /// Like [`start`](Self::start) but with an explicit catalogue.
    pub fn with_registry(
        config: &SessionConfig,
        registry: ModelRegistry,
        collaborators: Collaborators,
        geometry: FrameGeometry,
    ) -> Result<Self, SessionError> {
        let Collaborators {
            analysis,
            loader,
            downloader,
            extractor,
            sink,
        } = collaborators;
        let store = ModelStore::new(config.resolved_model_dir()?, downloader, extractor);
        Self::assemble(config, store, registry, analysis, loader, sink, geometry)
    }

    fn assemble(
        config: &SessionConfig,
        store: ModelStore,
        registry: ModelRegistry,
        analysis: Arc<dyn AnalysisPort>,
        loader: Arc<dyn ModelLoader>,
        sink: Box<dyn EventSink>,
        geometry: FrameGeometry,
    ) -> Result<Self, SessionError> {
        let gate = Arc::new(DetectionGate::new());
        let actor = EventActor::spawn(sink).map_err(SessionError::Spawn)?;
        let coordinator = DetectionCoordinator::new(
            analysis,
            Arc::clone(&gate),
            actor.sender(),
            geometry,
            config.coordinator_config(),
        )
        .map_err(SessionError::Spawn)?;
        let manager = ModelLifecycleManager::new(
            registry,
            store,
            loader,
            Arc::clone(&gate),
            actor.sender(),
        );
        log::info!(
            "Landmark session started ({} catalogue models)",
            manager.descriptors().len()
        );
        Ok(Self {
            gate,
            coordinator: Arc::new(coordinator),
            manager: Arc::new(manager),
            actor: Some(actor),
        })
    }

    /// Re-activates the model that was active when `config` was saved.
    pub fn restore(&self, config: &SessionConfig) -> Result<Option<ActivationHandle>, SessionError> {
        let Some(id) = config.last_active_model else {
            return Ok(None);
        };
        log::info!("Restoring model {id}");
        self.manager
            .activate_in_background(id)
            .map(Some)
            .map_err(SessionError::Spawn)
    }

    /// Records the active model in `config` for the next [`restore`](Self::restore).
    pub fn remember_active(&self, config: &mut SessionConfig) {
        config.last_active_model = self.manager.active_model();
    }

    pub fn coordinator(&self) -> &Arc<DetectionCoordinator> {
        &self.coordinator
    }

    pub fn manager(&self) -> &Arc<ModelLifecycleManager> {
        &self.manager
    }

    pub fn gate(&self) -> &Arc<DetectionGate> {
        &self.gate
    }

    /// Stops the analysis worker, then delivers every queued notification
    /// and stops the event actor.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.coordinator.shutdown();
        if let Some(actor) = self.actor.take() {
            actor.shutdown();
        }
    }
}

impl Drop for LandmarkSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn load_cached_catalogue(store: &ModelStore) -> ModelRegistry {
    let path = store.catalogue_path();
    match ModelRegistry::load_from_file(&path) {
        Ok(registry) => registry,
        Err(CatalogueError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
            log::info!("No cached catalogue at {}", path.display());
            ModelRegistry::default()
        }
        Err(e) => {
            log::warn!("Ignoring cached catalogue: {e}");
            ModelRegistry::default()
        }
    }
}
