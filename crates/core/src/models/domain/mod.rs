pub mod model_descriptor;
pub mod model_loader;
pub mod model_state;
pub mod transfer;
