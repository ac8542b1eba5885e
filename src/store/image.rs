use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::documents::DocumentStore;
use crate::store::StoreError;

/// Document key the cover-image mapping is persisted under.
pub const IMAGES_KEY: &str = "blog_cover_images";

/// One stored attachment. `data` is the encoded `data:` URI handed to
/// clients; the post record itself never carries the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub data: String,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub media_type: String,
}

/// A raw uploaded image, before validation and encoding.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub filename: String,
    /// Content type as declared by the uploader, if any. Falls back to a
    /// filename guess, then to the sniffed format.
    pub media_type: Option<String>,
}

/// Owns the post-id -> cover-image mapping. At most one attachment per post;
/// the whole mapping is persisted as a single document on every change.
pub struct CoverImageStore {
    documents: Arc<dyn DocumentStore>,
    images: Mutex<HashMap<String, CoverImage>>,
}

impl CoverImageStore {
    /// Open the store, loading any previously persisted mapping.
    pub async fn open(documents: Arc<dyn DocumentStore>) -> Result<Self, StoreError> {
        let images = match documents.read(IMAGES_KEY).await? {
            Some(json) => serde_json::from_str(&json)?,
            None => HashMap::new(),
        };

        Ok(Self {
            documents,
            images: Mutex::new(images),
        })
    }

    /// Encode and store the cover image for `post_id`, replacing any prior
    /// attachment. The mapping is only touched once encoding has succeeded;
    /// a failed persist leaves it unchanged. Returns the encoded payload.
    pub async fn save(&self, post_id: &str, upload: ImageUpload) -> Result<String, StoreError> {
        let entry = encode(upload).await?;
        let data = entry.data.clone();

        let mut images = self.images.lock().await;
        let mut next = images.clone();
        next.insert(post_id.to_string(), entry);
        self.persist(&next).await?;
        *images = next;

        Ok(data)
    }

    /// Pure lookup of the encoded payload.
    pub async fn get(&self, post_id: &str) -> Option<String> {
        self.images
            .lock()
            .await
            .get(post_id)
            .map(|image| image.data.clone())
    }

    pub async fn has(&self, post_id: &str) -> bool {
        self.images.lock().await.contains_key(post_id)
    }

    /// Delete the attachment for `post_id`. Returns whether an entry was
    /// removed; removing a missing entry is not an error.
    pub async fn remove(&self, post_id: &str) -> Result<bool, StoreError> {
        let mut images = self.images.lock().await;
        if !images.contains_key(post_id) {
            return Ok(false);
        }

        let mut next = images.clone();
        next.remove(post_id);
        self.persist(&next).await?;
        *images = next;

        Ok(true)
    }

    /// Sweep attachments older than `max_age_days`. Caller-triggered
    /// maintenance; persists at most once, and only when something was
    /// removed. Returns the number of entries removed.
    pub async fn evict_older_than(&self, max_age_days: i64) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(max_age_days);

        let mut images = self.images.lock().await;
        let mut next = images.clone();
        next.retain(|_, image| image.timestamp >= cutoff);

        let removed = images.len() - next.len();
        if removed > 0 {
            self.persist(&next).await?;
            *images = next;
            tracing::info!(
                "Evicted {} cover images older than {} days",
                removed,
                max_age_days
            );
        }

        Ok(removed)
    }

    async fn persist(&self, images: &HashMap<String, CoverImage>) -> Result<(), StoreError> {
        let json = serde_json::to_string(images)?;
        self.documents.write(IMAGES_KEY, &json).await?;
        Ok(())
    }
}

/// Validate and encode an upload into a mapping entry. Runs on a blocking
/// worker since payloads can be large.
async fn encode(upload: ImageUpload) -> Result<CoverImage, StoreError> {
    tokio::task::spawn_blocking(move || {
        let format = image::guess_format(&upload.bytes)
            .map_err(|_| StoreError::UnreadableImage(upload.filename.clone()))?;

        let media_type = upload
            .media_type
            .or_else(|| {
                mime_guess::from_path(&upload.filename)
                    .first()
                    .map(|mime| mime.essence_str().to_string())
            })
            .unwrap_or_else(|| format.to_mime_type().to_string());

        Ok(CoverImage {
            data: format!("data:{};base64,{}", media_type, BASE64.encode(&upload.bytes)),
            timestamp: Utc::now(),
            filename: upload.filename,
            media_type,
        })
    })
    .await?
}
