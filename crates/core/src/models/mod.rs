pub mod domain;
pub mod infrastructure;
pub mod integrity;
pub mod lifecycle_manager;
pub mod model_store;
pub mod registry;
