pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use pipeline::RegionOcrPipeline;
pub use preprocess::{crop_region, normalize, prepare_region, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, Script, ScriptedRecognizer};
pub use types::{OcrConfig, PageImage, RegionOcrOutput, RegionRequest};
