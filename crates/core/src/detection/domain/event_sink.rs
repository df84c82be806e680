use std::sync::Arc;

use crate::detection::domain::detection_event::DetectionEvent;
use crate::models::domain::model_descriptor::ModelId;
use crate::models::domain::model_state::ModelState;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Consumer of everything the session reports (overlay drawing, status
/// text, snapshot saving).
///
/// All calls arrive on one thread, one at a time, in emission order.
pub trait EventSink: Send {
    fn on_detection(&mut self, event: DetectionEvent);

    fn on_model_state_changed(&mut self, id: ModelId, state: ModelState);

    /// `region` is in driver coordinates, already padded for cropping.
    fn on_capture_requested(&mut self, frame: Arc<Frame>, region: Region);

    /// Download progress: `total` is 0 when the size is unknown.
    fn on_transfer_progress(&mut self, _id: ModelId, _done: u64, _total: u64) {}
}

/// One queued call to an [`EventSink`].
#[derive(Clone, Debug)]
pub enum Notification {
    Detection(DetectionEvent),
    ModelState(ModelId, ModelState),
    Capture(Arc<Frame>, Region),
    TransferProgress { id: ModelId, done: u64, total: u64 },
}

impl Notification {
    pub fn deliver(self, sink: &mut dyn EventSink) {
        match self {
            Notification::Detection(event) => sink.on_detection(event),
            Notification::ModelState(id, state) => sink.on_model_state_changed(id, state),
            Notification::Capture(frame, region) => sink.on_capture_requested(frame, region),
            Notification::TransferProgress { id, done, total } => {
                sink.on_transfer_progress(id, done, total)
            }
        }
    }
}
