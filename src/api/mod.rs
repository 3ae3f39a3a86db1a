pub mod client;
pub mod error;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod stream;

pub use client::{ByteStream, MachtianiClient};
pub use error::ApiError;
pub use stream::ChunkDecoder;
