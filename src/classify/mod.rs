mod backend;
pub mod gemini;
pub mod reply;
mod result;

pub use backend::Classifier;
pub use gemini::{GeminiClassifier, GeminiConfig};
pub use reply::{parse_reply, strip_fences, CLASSIFICATION_PROMPT};
pub use result::{ClassificationResult, Direction, LoadStatus, TarpStatus, VehicleType};
