//! Turns camera callbacks into overlay events.
//!
//! Frames and face-candidate batches arrive on the camera thread. Each
//! batch is resolved synchronously into a face box; landmark analysis is
//! handed to one background worker, at most one call at a time, and only
//! while a model is active and not being swapped. A suppressed cycle still
//! emits its face box so the overlay keeps tracking.
//!
//! Events carry the face in preview pixels. Capture requests carry it in
//! driver coordinates, which is what the cropping side expects.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::detection::domain::analysis_port::{AnalysisError, AnalysisPort};
use crate::detection::domain::detection_event::DetectionEvent;
use crate::detection::domain::face_candidate::{select_best, FaceCandidate};
use crate::pipeline::event_actor::EventSender;
use crate::shared::constants::{CAPTURE_SCALE, CONFIDENCE_THRESHOLD, DEFAULT_STALL_WARNING_MS};
use crate::shared::detection_gate::{DetectionGate, DispatchTicket, Suppressed};
use crate::shared::frame::{Frame, FrameGeometry};
use crate::shared::region::Region;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no camera frame received yet")]
    NoFrame,
    #[error("no face detected")]
    NoFace,
}

#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// Candidates must score strictly above this.
    pub confidence_threshold: i32,
    /// How long one analysis may run before a starved cycle logs a warning.
    pub stall_warning: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            stall_warning: Duration::from_millis(DEFAULT_STALL_WARNING_MS),
        }
    }
}

struct AnalysisJob {
    ticket: DispatchTicket,
    frame: Arc<Frame>,
    geometry: FrameGeometry,
    /// Driver coordinates, for capture.
    face: Region,
    /// Preview pixels, for analysis and drawing.
    mapped: Region,
}

pub struct DetectionCoordinator {
    latest_frame: Mutex<Option<Arc<Frame>>>,
    geometry: Mutex<FrameGeometry>,
    last_face: Mutex<Option<Region>>,
    gate: Arc<DetectionGate>,
    events: EventSender,
    jobs: Mutex<Option<Sender<AnalysisJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: CoordinatorConfig,
}

impl DetectionCoordinator {
    /// Starts the analysis worker thread.
    pub fn new(
        port: Arc<dyn AnalysisPort>,
        gate: Arc<DetectionGate>,
        events: EventSender,
        geometry: FrameGeometry,
        config: CoordinatorConfig,
    ) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::bounded(1);
        let worker = spawn_analysis_worker(port, Arc::clone(&gate), events.clone(), job_rx)?;
        Ok(Self {
            latest_frame: Mutex::new(None),
            geometry: Mutex::new(geometry),
            last_face: Mutex::new(None),
            gate,
            events,
            jobs: Mutex::new(Some(job_tx)),
            worker: Mutex::new(Some(worker)),
            config,
        })
    }

    /// Replaces the stored frame. Older frames are simply dropped.
    pub fn on_frame(&self, data: Vec<u8>) {
        *lock(&self.latest_frame) = Some(Arc::new(Frame::new(data)));
    }

    pub fn set_geometry(&self, geometry: FrameGeometry) {
        *lock(&self.geometry) = geometry;
    }

    /// Runs one detection cycle for the candidates reported by the camera.
    pub fn on_face_candidates(&self, candidates: &[FaceCandidate]) {
        let frame = lock(&self.latest_frame).clone();
        let best = frame
            .as_ref()
            .and_then(|_| select_best(candidates, self.config.confidence_threshold))
            .copied();
        *lock(&self.last_face) = best.map(|c| c.region);

        let (Some(frame), Some(best)) = (frame, best) else {
            self.events.detection(DetectionEvent::empty());
            return;
        };

        let geometry = *lock(&self.geometry);
        let mapped = best.region.map_to(geometry);

        let ticket = match self.gate.begin_dispatch() {
            Ok(ticket) => ticket,
            Err(reason) => {
                self.report_suppressed(reason);
                self.events.detection(DetectionEvent::face_only(mapped));
                return;
            }
        };

        let job = AnalysisJob {
            ticket,
            frame,
            geometry,
            face: best.region,
            mapped,
        };
        let sent = match lock(&self.jobs).as_ref() {
            Some(jobs) => jobs.try_send(job),
            None => Err(TrySendError::Disconnected(job)),
        };
        if let Err(e) = sent {
            // Dropping the job releases its ticket.
            log::warn!("Analysis worker unavailable; showing face only");
            drop(e.into_inner());
            self.events.detection(DetectionEvent::face_only(mapped));
        }
    }

    /// Asks the sink to save a snapshot of the current face.
    pub fn request_capture(&self) -> Result<(), CaptureError> {
        let frame = lock(&self.latest_frame)
            .clone()
            .ok_or(CaptureError::NoFrame)?;
        let face = (*lock(&self.last_face)).ok_or(CaptureError::NoFace)?;
        self.events.capture(frame, face.capture_region(CAPTURE_SCALE));
        Ok(())
    }

    /// Stops the analysis worker after any outstanding call resolves.
    pub fn shutdown(&self) {
        lock(&self.jobs).take();
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                log::error!("Analysis worker panicked");
            }
        }
    }

    fn report_suppressed(&self, reason: Suppressed) {
        log::debug!("Landmark dispatch suppressed: {reason}");
        if reason == Suppressed::InFlight {
            if let Some(elapsed) = self.gate.take_stall(self.config.stall_warning) {
                log::warn!(
                    "Landmark analysis still running after {} ms; landmarks are stalled",
                    elapsed.as_millis()
                );
            }
        }
    }
}

impl Drop for DetectionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_analysis_worker(
    port: Arc<dyn AnalysisPort>,
    gate: Arc<DetectionGate>,
    events: EventSender,
    jobs: Receiver<AnalysisJob>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("landmark-analysis".into())
        .spawn(move || {
            for job in jobs {
                run_analysis(port.as_ref(), &gate, &events, job);
            }
        })
}

fn run_analysis(port: &dyn AnalysisPort, gate: &DetectionGate, events: &EventSender, job: AnalysisJob) {
    let AnalysisJob {
        ticket,
        frame,
        geometry,
        face,
        mapped,
    } = job;

    let result = panic::catch_unwind(AssertUnwindSafe(|| port.analyze(&frame, geometry, &mapped)))
        .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload))));

    match result {
        Ok(landmarks) => {
            let found = !landmarks.is_empty();
            events.detection(DetectionEvent::with_landmarks(mapped, landmarks));
            if found && gate.claim_capture() {
                log::info!("First landmarks for model {}; requesting capture", ticket.model());
                events.capture(frame, face.capture_region(CAPTURE_SCALE));
            }
        }
        Err(e) => {
            log::warn!("Landmark analysis failed: {e} ({})", e.recovery());
            events.detection(DetectionEvent::face_only(mapped));
        }
    }
    // Released only after the result has been queued.
    drop(ticket);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
