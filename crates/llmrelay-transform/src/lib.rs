pub mod chat;
pub mod envelope;
pub mod ids;
pub mod limits;
pub mod list_models;
pub mod matrix;
pub mod reason;
pub mod schema;

pub use envelope::{ChatRequest, ChatResponse, ModelList, StreamPayload};
pub use matrix::{StreamConverter, TransformOptions, convert_model_list, convert_request, convert_response, stream_converter};
