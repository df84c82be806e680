pub mod detection_coordinator;
pub mod event_actor;
pub mod landmark_session;
