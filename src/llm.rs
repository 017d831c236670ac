//! Inference server access.

pub mod kobold;
pub mod traits;

pub use kobold::KoboldClient;
pub use traits::InferenceBackend;
