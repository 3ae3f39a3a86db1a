pub mod response;

pub use response::{GenerateOptions, GeneratedResponse, ResponseStreamer};
