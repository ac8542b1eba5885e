mod image;
mod post;
mod slug;

pub use self::image::{CoverImage, CoverImageStore, ImageUpload, IMAGES_KEY};
pub use self::post::{Post, PostDraft, PostPatch, PostStatus, PostStore, POSTS_KEY};
pub use self::slug::{parse_tags, slugify};

use thiserror::Error;

use crate::db::documents::DocumentError;

/// Failures the stores surface. Missing records are `None`/no-op results,
/// never errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document storage error: {0}")]
    Documents(#[from] DocumentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    #[error("Image encode task failed: {0}")]
    EncodeTask(#[from] tokio::task::JoinError),
}
