//! Prediction infrastructure - upload staging and the classifier process

mod script;
mod upload;

pub use script::ScriptPredictor;
pub use upload::{StagedUpload, UploadStore};
