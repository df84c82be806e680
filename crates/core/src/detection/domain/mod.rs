pub mod analysis_port;
pub mod detection_event;
pub mod event_sink;
pub mod face_candidate;
pub mod landmarks;
