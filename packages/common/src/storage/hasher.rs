use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::hash::ContentHash;

/// Read size used while hashing uploads.
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Hash a stream in bounded chunks, returning the digest and byte count.
///
/// Stops reading as soon as the running count exceeds `max_size`, so an
/// oversized upload is rejected without consuming the rest of the stream.
/// The reader is left wherever hashing stopped; callers that need the bytes
/// again must seek back to the start.
pub async fn hash_stream<R>(reader: &mut R, max_size: u64) -> Result<(ContentHash, u64), StorageError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut total_bytes: u64 = 0;
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        total_bytes += n as u64;
        if total_bytes > max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: total_bytes,
                limit: max_size,
            });
        }

        hasher.update(&buf[..n]);
    }

    Ok((ContentHash::from_bytes(hasher.finalize().into()), total_bytes))
}
