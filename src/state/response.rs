mod blocks;
mod core;
mod state;


pub use blocks::{normalize_block, BlockAccumulator, BlockEvent};
pub use state::{
    conversation_header, retrieved_paths_trailer, GenerateOptions, GeneratedResponse,
    ResponseStreamer,
};
