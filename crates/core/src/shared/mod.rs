pub mod constants;
pub mod detection_gate;
pub mod frame;
pub mod recovery;
pub mod region;
