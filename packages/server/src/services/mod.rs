pub mod deletion;
pub mod naming;
pub mod upload;

pub use deletion::{DeleteError, DeletionService};
pub use upload::{UploadError, UploadOutcome, UploadPolicy, UploadRequest, UploadService};

/// The authenticated account a workflow acts for.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: i32,
    /// Used as the per-owner segment of storage keys.
    pub username: String,
}
