pub mod audio;
pub mod client;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod registry;
pub mod render;
pub mod settings;
pub mod viewport;

pub use controller::*;
pub use errors::SourceError;
pub use registry::{InstanceId, InstanceRegistry};
