//! The single consumer of sink notifications.
//!
//! Every producer (coordinator cycles, analysis worker, model lifecycle
//! jobs) holds an [`EventSender`]; one dedicated thread owns the
//! [`EventSink`] and delivers notifications in the order they were queued,
//! so the sink never sees two calls at once.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::detection_event::DetectionEvent;
use crate::detection::domain::event_sink::{EventSink, Notification};
use crate::models::domain::model_descriptor::ModelId;
use crate::models::domain::model_state::ModelState;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

enum Envelope {
    Notify(Notification),
    Shutdown,
}

/// Cloneable handle for queueing sink notifications.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Envelope>,
}

impl EventSender {
    pub fn send(&self, notification: Notification) {
        if self.tx.send(Envelope::Notify(notification)).is_err() {
            log::debug!("Event actor stopped; dropping notification");
        }
    }

    pub fn detection(&self, event: DetectionEvent) {
        self.send(Notification::Detection(event));
    }

    pub fn model_state(&self, id: ModelId, state: ModelState) {
        self.send(Notification::ModelState(id, state));
    }

    pub fn capture(&self, frame: Arc<Frame>, region: Region) {
        self.send(Notification::Capture(frame, region));
    }

    pub fn transfer_progress(&self, id: ModelId, done: u64, total: u64) {
        self.send(Notification::TransferProgress { id, done, total });
    }
}

pub struct EventActor {
    sender: EventSender,
    handle: Option<JoinHandle<()>>,
}

impl EventActor {
    /// Starts the delivery thread. The sink is moved onto it and dropped
    /// when the actor shuts down.
    pub fn spawn(sink: Box<dyn EventSink>) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("event-actor".into())
            .spawn(move || run(sink, rx))?;
        Ok(Self {
            sender: EventSender { tx },
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Delivers everything queued so far, then stops the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.tx.send(Envelope::Shutdown);
        if handle.join().is_err() {
            log::error!("Event sink panicked");
        }
    }
}

impl Drop for EventActor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut sink: Box<dyn EventSink>, rx: Receiver<Envelope>) {
    for envelope in rx {
        match envelope {
            Envelope::Notify(notification) => notification.deliver(sink.as_mut()),
            Envelope::Shutdown => break,
        }
    }
    log::debug!("Event actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ChannelSink {
        tx: Sender<Notification>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl EventSink for ChannelSink {
        fn on_detection(&mut self, event: DetectionEvent) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            self.tx.send(Notification::Detection(event)).unwrap();
            self.active.fetch_sub(1, Ordering::SeqCst);
        }

        fn on_model_state_changed(&mut self, id: ModelId, state: ModelState) {
            self.tx.send(Notification::ModelState(id, state)).unwrap();
        }

        fn on_capture_requested(&mut self, frame: Arc<Frame>, region: Region) {
            self.tx.send(Notification::Capture(frame, region)).unwrap();
        }
    }

    fn spawn_actor() -> (EventActor, Receiver<Notification>, Arc<AtomicUsize>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let max_active = Arc::new(AtomicUsize::new(0));
        let sink = ChannelSink {
            tx,
            active: Arc::new(AtomicUsize::new(0)),
            max_active: max_active.clone(),
        };
        (EventActor::spawn(Box::new(sink)).unwrap(), rx, max_active)
    }

    #[test]
    fn test_delivers_in_queue_order() {
        let (actor, rx, _) = spawn_actor();
        let sender = actor.sender();
        for i in 0..10 {
            sender.detection(DetectionEvent::face_only(Region::new(i, i, i, i)));
        }
        actor.shutdown();

        let lefts: Vec<i32> = rx
            .try_iter()
            .map(|n| match n {
                Notification::Detection(e) => e.face().unwrap().left,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lefts, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_never_delivers_concurrently() {
        let (actor, rx, max_active) = spawn_actor();
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let sender = actor.sender();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        sender.detection(DetectionEvent::empty());
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        actor.shutdown();

        assert_eq!(rx.try_iter().count(), 40);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_progress_handler_is_noop() {
        let (actor, rx, _) = spawn_actor();
        actor.sender().transfer_progress(ModelId(1), 5, 10);
        actor.sender().model_state(ModelId(1), ModelState::Downloading);
        actor.shutdown();

        let delivered: Vec<_> = rx.try_iter().collect();
        assert_eq!(delivered.len(), 1);
        assert!(matches!(
            delivered[0],
            Notification::ModelState(ModelId(1), ModelState::Downloading)
        ));
    }

    #[test]
    fn test_send_after_shutdown_is_dropped() {
        let (actor, _rx, _) = spawn_actor();
        let sender = actor.sender();
        actor.shutdown();
        sender.detection(DetectionEvent::empty());
    }
}
