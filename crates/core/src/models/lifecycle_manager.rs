//! Per-model state machine and the single active-model slot.
//!
//! `activate` drives a model from wherever it is to `Loaded`:
//! fetch (download + extract) if the file is missing, then take the swap
//! side of the [`DetectionGate`], verify the digest, and hand the file to
//! the native loader. The gate is held only for verify + load; transfers
//! run outside it so detection keeps going while a model downloads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::detection::domain::detection_event::DetectionEvent;
use crate::models::domain::model_descriptor::{ModelDescriptor, ModelId};
use crate::models::domain::model_loader::{LoadError, ModelLoader};
use crate::models::domain::model_state::ModelState;
use crate::models::domain::transfer::{ProgressFn, TransferError};
use crate::models::integrity::{Verification, MISSING_DIGEST};
use crate::models::model_store::ModelStore;
use crate::models::registry::{CatalogueDiff, ModelRegistry};
use crate::pipeline::event_actor::EventSender;
use crate::shared::detection_gate::{DetectionGate, SwapGuard};
use crate::shared::recovery::Recovery;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("model {0} is not in the catalogue")]
    UnknownModel(ModelId),
    #[error("cannot change model {requested}: another swap or transfer is in progress")]
    Busy { requested: ModelId },
    #[error("transfer of model {id} failed: {source}")]
    Transfer {
        id: ModelId,
        #[source]
        source: TransferError,
    },
    #[error("model {id} is corrupted: expected digest {expected}, got {actual:?}")]
    IntegrityMismatch {
        id: ModelId,
        expected: String,
        actual: String,
    },
    #[error("failed to load model {id}: {source}")]
    Load {
        id: ModelId,
        #[source]
        source: LoadError,
    },
    #[error("file operation on model {id} failed: {source}")]
    Io {
        id: ModelId,
        #[source]
        source: std::io::Error,
    },
}

impl LifecycleError {
    pub fn recovery(&self) -> Recovery {
        match self {
            LifecycleError::IntegrityMismatch { .. } | LifecycleError::Load { .. } => {
                Recovery::PromptRedownload
            }
            LifecycleError::UnknownModel(_)
            | LifecycleError::Busy { .. }
            | LifecycleError::Transfer { .. }
            | LifecycleError::Io { .. } => Recovery::PromptRetry,
        }
    }
}

/// Result of a successful [`ModelLifecycleManager::activate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// The model was verified and handed to the native runtime.
    Loaded,
    /// The model was already active; nothing was done.
    AlreadyActive,
}

pub struct ModelLifecycleManager {
    registry: RwLock<ModelRegistry>,
    store: ModelStore,
    loader: Arc<dyn ModelLoader>,
    gate: Arc<DetectionGate>,
    events: EventSender,
    states: Mutex<HashMap<ModelId, ModelState>>,
}

impl ModelLifecycleManager {
    pub fn new(
        registry: ModelRegistry,
        store: ModelStore,
        loader: Arc<dyn ModelLoader>,
        gate: Arc<DetectionGate>,
        events: EventSender,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            store,
            loader,
            gate,
            events,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn active_model(&self) -> Option<ModelId> {
        self.gate.active_model()
    }

    pub fn descriptor(&self, id: ModelId) -> Option<ModelDescriptor> {
        self.read_registry().get(id).cloned()
    }

    /// Snapshot of the catalogue in id order.
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.read_registry().iter().cloned().collect()
    }

    /// Current state of `id`. Models never touched this session report
    /// `Available` if their file is on disk, `Absent` otherwise.
    pub fn state(&self, id: ModelId) -> ModelState {
        if let Some(state) = self.lock_states().get(&id) {
            return *state;
        }
        match self.descriptor(id) {
            Some(d) if self.store.exists(&d) => ModelState::Available,
            _ => ModelState::Absent,
        }
    }

    /// Makes `id` the active model, fetching it first if needed.
    ///
    /// Rejected with `Busy` (never queued) while any swap is pending or
    /// while this model is already being transferred. On every failure the
    /// previously active model stays active.
    pub fn activate(&self, id: ModelId) -> Result<Activation, LifecycleError> {
        let descriptor = self
            .descriptor(id)
            .ok_or(LifecycleError::UnknownModel(id))?;

        let present = self.store.exists(&descriptor);
        if present && self.gate.active_model() == Some(id) {
            log::debug!("Model {id} already active");
            return Ok(Activation::AlreadyActive);
        }
        if self.gate.is_swap_in_progress() {
            return Err(LifecycleError::Busy { requested: id });
        }
        if !present {
            self.transfer(&descriptor)?;
            return self.swap_in_fetched(&descriptor);
        }
        self.swap_in(&descriptor)
    }

    /// Runs [`activate`](Self::activate) on a background thread.
    pub fn activate_in_background(
        self: &Arc<Self>,
        id: ModelId,
    ) -> std::io::Result<JoinHandle<Result<Activation, LifecycleError>>> {
        let manager = Arc::clone(self);
        thread::Builder::new()
            .name(format!("activate-{id}"))
            .spawn(move || {
                let result = manager.activate(id);
                if let Err(ref e) = result {
                    log::warn!("Activation of model {id} failed: {e} ({})", e.recovery());
                }
                result
            })
    }

    /// Downloads and extracts `id` without activating it.
    pub fn fetch(&self, id: ModelId) -> Result<PathBuf, LifecycleError> {
        let descriptor = self
            .descriptor(id)
            .ok_or(LifecycleError::UnknownModel(id))?;
        self.transfer(&descriptor)?;
        self.set_state(id, ModelState::Available);
        Ok(self.store.path_of(&descriptor))
    }

    /// Discards the local copy of `id` and activates a fresh download.
    /// The answer to a `Corrupted` report.
    pub fn redownload(&self, id: ModelId) -> Result<Activation, LifecycleError> {
        let descriptor = self
            .descriptor(id)
            .ok_or(LifecycleError::UnknownModel(id))?;
        self.discard(&descriptor)?;
        self.activate(id)
    }

    /// Replaces the local copy of `id` with the catalogue's current version.
    /// If `id` is the active model it is verified and reloaded.
    ///
    /// If the re-transfer fails the model ends `Failed` with no local file.
    /// An active model stays in the active slot, since the native runtime
    /// still holds the copy it loaded; the next `activate` fetches it again.
    pub fn update(&self, id: ModelId) -> Result<(), LifecycleError> {
        let descriptor = self
            .descriptor(id)
            .ok_or(LifecycleError::UnknownModel(id))?;
        if self.gate.is_swap_in_progress() {
            return Err(LifecycleError::Busy { requested: id });
        }
        self.discard(&descriptor)?;
        self.transfer(&descriptor)?;
        if self.gate.active_model() == Some(id) {
            self.swap_in_fetched(&descriptor)?;
        } else {
            self.set_state(id, ModelState::Available);
        }
        Ok(())
    }

    /// Installs a refreshed catalogue, persists it next to the models, and
    /// reports what changed. Nothing is downloaded.
    pub fn replace_catalogue(&self, remote: ModelRegistry) -> CatalogueDiff {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let diff = registry.diff(&remote);
        if let Err(e) = remote.save_to_file(&self.store.catalogue_path()) {
            log::warn!("Failed to cache catalogue: {e}");
        }
        *registry = remote;
        log::info!(
            "Catalogue replaced: {} new, {} updated",
            diff.new_models.len(),
            diff.updates.len()
        );
        diff
    }

    // ── Internals ───────────────────────────────────────────────────

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, ModelRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<ModelId, ModelState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, id: ModelId, state: ModelState) {
        let previous = self.lock_states().insert(id, state);
        if previous != Some(state) {
            log::info!("Model {id}: {state}");
        }
        self.events.model_state(id, state);
    }

    /// Moves `id` to `Downloading` unless another transfer of it is running.
    fn claim_transfer(&self, id: ModelId) -> Result<(), LifecycleError> {
        let mut states = self.lock_states();
        if states.get(&id).is_some_and(|s| s.is_transferring()) {
            return Err(LifecycleError::Busy { requested: id });
        }
        states.insert(id, ModelState::Downloading);
        drop(states);
        log::info!("Model {id}: {}", ModelState::Downloading);
        self.events.model_state(id, ModelState::Downloading);
        Ok(())
    }

    fn transfer(&self, descriptor: &ModelDescriptor) -> Result<(), LifecycleError> {
        let id = descriptor.id();
        self.claim_transfer(id)?;

        let events = self.events.clone();
        let progress: ProgressFn =
            Box::new(move |done, total| events.transfer_progress(id, done, total));
        let fail = |source: TransferError| {
            self.set_state(id, ModelState::Failed);
            LifecycleError::Transfer { id, source }
        };

        self.store
            .download_archive(descriptor, Some(progress))
            .map_err(fail)?;
        self.set_state(id, ModelState::Extracting);
        self.store.extract_archive(descriptor).map_err(fail)?;
        Ok(())
    }

    fn discard(&self, descriptor: &ModelDescriptor) -> Result<(), LifecycleError> {
        let id = descriptor.id();
        if self.lock_states().get(&id).is_some_and(|s| s.is_transferring()) {
            return Err(LifecycleError::Busy { requested: id });
        }
        self.store
            .delete(descriptor)
            .map_err(|source| LifecycleError::Io { id, source })?;
        self.set_state(id, ModelState::Absent);
        Ok(())
    }

    /// Verify + load under the swap side of the gate.
    fn swap_in(&self, descriptor: &ModelDescriptor) -> Result<Activation, LifecycleError> {
        let id = descriptor.id();
        let guard = self
            .gate
            .begin_swap(id)
            .map_err(|_| LifecycleError::Busy { requested: id })?;
        // Stale overlays belong to the outgoing model.
        self.events.detection(DetectionEvent::empty());
        self.load_locked(descriptor, &guard)?;
        Ok(Activation::Loaded)
    }

    /// [`swap_in`](Self::swap_in) for a model whose transfer just finished.
    /// If the gate is taken by another swap the file is left `Available`
    /// rather than stuck in `Extracting`.
    fn swap_in_fetched(&self, descriptor: &ModelDescriptor) -> Result<Activation, LifecycleError> {
        let result = self.swap_in(descriptor);
        if let Err(LifecycleError::Busy { .. }) = &result {
            self.set_state(descriptor.id(), ModelState::Available);
        }
        result
    }

    fn load_locked(
        &self,
        descriptor: &ModelDescriptor,
        guard: &SwapGuard,
    ) -> Result<(), LifecycleError> {
        let id = descriptor.id();
        self.set_state(id, ModelState::Verifying);
        match self.store.verify(descriptor) {
            Ok(Verification::Match) => {}
            Ok(Verification::Mismatch { actual }) => {
                return Err(self.reject_corrupted(descriptor, actual));
            }
            Ok(Verification::Missing) => {
                return Err(self.reject_corrupted(descriptor, MISSING_DIGEST.to_string()));
            }
            Err(source) => {
                // The file stays; only a digest disagreement deletes it.
                log::warn!("Cannot read model {id} for verification: {source}");
                self.set_state(id, ModelState::Failed);
                return Err(LifecycleError::Io { id, source });
            }
        }

        let path = self.store.path_of(descriptor);
        if let Err(source) = self.loader.load_model(&path) {
            self.set_state(id, ModelState::Failed);
            return Err(LifecycleError::Load { id, source });
        }

        let previous = guard.commit();
        self.set_state(id, ModelState::Loaded);
        if let Some(previous) = previous.filter(|p| *p != id) {
            self.set_state(previous, ModelState::Available);
        }
        Ok(())
    }

    fn reject_corrupted(&self, descriptor: &ModelDescriptor, actual: String) -> LifecycleError {
        let id = descriptor.id();
        log::warn!(
            "Model {id} failed verification: expected {}, got {actual:?}",
            descriptor.expected_digest()
        );
        if let Err(e) = self.store.delete(descriptor) {
            log::warn!("Failed to delete corrupted model {id}: {e}");
        }
        self.set_state(id, ModelState::Corrupted);
        LifecycleError::IntegrityMismatch {
            id,
            expected: descriptor.expected_digest().to_string(),
            actual,
        }
    }
}
