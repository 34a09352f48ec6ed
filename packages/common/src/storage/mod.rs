mod error;
mod hash;
mod traits;

pub mod filesystem;
pub mod hasher;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use hash::ContentHash;
pub use hasher::{HASH_CHUNK_SIZE, hash_stream};
pub use traits::{BoxReader, ObjectInfo, ObjectStore};
