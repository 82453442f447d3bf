mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectionStage, DetectorBackend};
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::YoloBackend;
pub use registry::DetectorRegistry;
pub use result::Detection;
