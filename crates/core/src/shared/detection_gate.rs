use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::models::domain::model_descriptor::ModelId;

/// Mutual-exclusion point shared by the detection coordinator and the model
/// lifecycle manager.
///
/// One mutex guards every piece of state both sides read: whether a swap is
/// pending, whether an analysis call is outstanding, which model is active,
/// and whether this activation has already auto-captured. Dispatch and swap
/// are handed out as RAII tokens that release their flag on drop.
pub struct DetectionGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    swap_in_progress: Option<ModelId>,
    detection_in_flight: bool,
    in_flight_since: Option<Instant>,
    stall_reported: bool,
    active_model: Option<ModelId>,
    captured: bool,
}

/// Why a detection cycle was not allowed to dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suppressed {
    InFlight,
    SwapInProgress,
    NoActiveModel,
}

impl fmt::Display for Suppressed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suppressed::InFlight => write!(f, "analysis in flight"),
            Suppressed::SwapInProgress => write!(f, "model swap in progress"),
            Suppressed::NoActiveModel => write!(f, "no active model"),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a swap to model {swapping} is already in progress")]
pub struct GateBusy {
    pub swapping: ModelId,
}

impl DetectionGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the single analysis slot, or reports why it cannot be claimed.
    ///
    /// The in-flight flag is set before this returns, so a reentrant cycle
    /// observes it even if the caller has not dispatched yet.
    pub fn begin_dispatch(self: &Arc<Self>) -> Result<DispatchTicket, Suppressed> {
        let mut state = self.lock();
        if state.detection_in_flight {
            return Err(Suppressed::InFlight);
        }
        if state.swap_in_progress.is_some() {
            return Err(Suppressed::SwapInProgress);
        }
        let Some(model) = state.active_model else {
            return Err(Suppressed::NoActiveModel);
        };
        state.detection_in_flight = true;
        state.in_flight_since = Some(Instant::now());
        state.stall_reported = false;
        Ok(DispatchTicket {
            gate: Arc::clone(self),
            model,
        })
    }

    /// Marks a swap as pending, then blocks until any outstanding analysis
    /// has resolved.
    ///
    /// New dispatches are suppressed from the moment this is called. A
    /// second swap while one is pending is rejected, never queued.
    pub fn begin_swap(self: &Arc<Self>, id: ModelId) -> Result<SwapGuard, GateBusy> {
        let mut state = self.lock();
        if let Some(swapping) = state.swap_in_progress {
            return Err(GateBusy { swapping });
        }
        state.swap_in_progress = Some(id);
        let _state = self
            .drained
            .wait_while(state, |s| s.detection_in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(SwapGuard {
            gate: Arc::clone(self),
            id,
        })
    }

    pub fn active_model(&self) -> Option<ModelId> {
        self.lock().active_model
    }

    pub fn is_swap_in_progress(&self) -> bool {
        self.lock().swap_in_progress.is_some()
    }

    pub fn is_detection_in_flight(&self) -> bool {
        self.lock().detection_in_flight
    }

    /// Whether this activation has already auto-captured.
    pub fn is_captured(&self) -> bool {
        self.lock().captured
    }

    /// Takes the one auto-capture allowed per activation.
    ///
    /// Returns `true` exactly once between two successful swaps, and only
    /// while a model is active.
    pub fn claim_capture(&self) -> bool {
        let mut state = self.lock();
        if state.active_model.is_none() || state.captured {
            return false;
        }
        state.captured = true;
        true
    }

    /// Returns how long the outstanding analysis has been running, the first
    /// time it is observed beyond `threshold`. Later calls for the same
    /// analysis return `None`.
    pub fn take_stall(&self, threshold: Duration) -> Option<Duration> {
        let mut state = self.lock();
        if !state.detection_in_flight || state.stall_reported {
            return None;
        }
        let elapsed = state.in_flight_since?.elapsed();
        if elapsed <= threshold {
            return None;
        }
        state.stall_reported = true;
        Some(elapsed)
    }

    fn finish_dispatch(&self) {
        let mut state = self.lock();
        state.detection_in_flight = false;
        state.in_flight_since = None;
        drop(state);
        self.drained.notify_all();
    }

    fn finish_swap(&self) {
        self.lock().swap_in_progress = None;
    }
}

impl Default for DetectionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the holder owns the analysis slot. Dropping it (after the
/// analysis resolved, failed, or panicked) frees the slot.
pub struct DispatchTicket {
    gate: Arc<DetectionGate>,
    model: ModelId,
}

impl DispatchTicket {
    /// The model that was active when the slot was claimed.
    pub fn model(&self) -> ModelId {
        self.model
    }
}

impl fmt::Debug for DispatchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTicket")
            .field("model", &self.model)
            .finish()
    }
}

impl Drop for DispatchTicket {
    fn drop(&mut self) {
        self.gate.finish_dispatch();
    }
}

/// Exclusive right to change the active model. Dropping it ends the swap
/// whether or not [`SwapGuard::commit`] was called.
pub struct SwapGuard {
    gate: Arc<DetectionGate>,
    id: ModelId,
}

impl SwapGuard {
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Publishes the swapped-in model and re-arms auto-capture, atomically.
    /// Returns the previously active model.
    pub fn commit(&self) -> Option<ModelId> {
        let mut state = self.gate.lock();
        let previous = state.active_model.replace(self.id);
        state.captured = false;
        previous
    }
}

impl fmt::Debug for SwapGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapGuard").field("id", &self.id).finish()
    }
}

impl Drop for SwapGuard {
    fn drop(&mut self) {
        self.gate.finish_swap();
    }
}
