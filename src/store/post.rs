use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::documents::DocumentStore;
use crate::store::image::{CoverImageStore, ImageUpload};
use crate::store::slug::{parse_tags, slugify};
use crate::store::StoreError;

/// Document key the post collection is persisted under.
pub const POSTS_KEY: &str = "blog_posts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    /// Derived from the title on every create/update; not independently
    /// editable, and not guaranteed unique.
    pub slug: String,
    pub content: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub featured: bool,
    /// Resolved from the cover-image store on reads. Always `None` in the
    /// canonical collection, so the persisted document never embeds the
    /// payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw form fields for a new post. `tags` is the comma-delimited field as
/// submitted; the store derives the tag list and the slug. The store does
/// not enforce non-empty fields - that validation belongs to the caller.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: String,
    pub excerpt: Option<String>,
    pub status: PostStatus,
    pub featured: bool,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<PostStatus>,
    pub featured: Option<bool>,
}

/// Single source of truth for post records. Keeps the collection in memory
/// in insertion order and persists it whole on every mutation: the new
/// collection is written first and committed to memory only if the write
/// succeeds, so a failed persist leaves observable state unchanged.
pub struct PostStore {
    documents: Arc<dyn DocumentStore>,
    images: Arc<CoverImageStore>,
    posts: Mutex<Vec<Post>>,
}

impl PostStore {
    /// Open the store, loading any previously persisted collection.
    pub async fn open(
        documents: Arc<dyn DocumentStore>,
        images: Arc<CoverImageStore>,
    ) -> Result<Self, StoreError> {
        let posts = match documents.read(POSTS_KEY).await? {
            Some(json) => {
                let mut posts: Vec<Post> = serde_json::from_str(&json)?;
                // The image table is the source of truth for payloads.
                for post in &mut posts {
                    post.cover_image = None;
                }
                posts
            }
            None => Vec::new(),
        };

        Ok(Self {
            documents,
            images,
            posts: Mutex::new(posts),
        })
    }

    /// Append a new post. The record mutation and persist happen before this
    /// returns; a supplied cover image is encoded and attached on a spawned
    /// task, so an immediate re-read may still see `cover_image == None`
    /// until that save settles.
    pub async fn create(
        &self,
        draft: PostDraft,
        image: Option<ImageUpload>,
    ) -> Result<Post, StoreError> {
        let now = Utc::now();
        let post = Post {
            id: uuid::Uuid::now_v7().to_string(),
            slug: slugify(&draft.title),
            title: draft.title,
            content: draft.content,
            category: draft.category,
            excerpt: normalize_excerpt(draft.excerpt),
            tags: parse_tags(&draft.tags),
            status: draft.status,
            featured: draft.featured,
            cover_image: None,
            created_at: now,
            updated_at: now,
        };

        {
            let mut posts = self.posts.lock().await;
            let mut next = posts.clone();
            next.push(post.clone());
            self.persist(&next).await?;
            *posts = next;
        }

        if let Some(upload) = image {
            self.spawn_attach(post.id.clone(), upload);
        }

        Ok(post)
    }

    /// Merge `patch` over the existing record, recompute the slug from the
    /// merged title, and refresh `updated_at`. Returns `None` for an unknown
    /// id. `remove_cover` deletes the attachment and wins over a
    /// simultaneously supplied image.
    pub async fn update(
        &self,
        id: &str,
        patch: PostPatch,
        image: Option<ImageUpload>,
        remove_cover: bool,
    ) -> Result<Option<Post>, StoreError> {
        let mut updated = {
            let mut posts = self.posts.lock().await;
            let Some(index) = posts.iter().position(|post| post.id == id) else {
                return Ok(None);
            };

            let mut next = posts.clone();
            let post = &mut next[index];
            if let Some(title) = patch.title {
                post.title = title;
            }
            if let Some(content) = patch.content {
                post.content = content;
            }
            if let Some(category) = patch.category {
                post.category = category;
            }
            if let Some(tags) = patch.tags {
                post.tags = parse_tags(&tags);
            }
            if let Some(excerpt) = patch.excerpt {
                post.excerpt = normalize_excerpt(Some(excerpt));
            }
            if let Some(status) = patch.status {
                post.status = status;
            }
            if let Some(featured) = patch.featured {
                post.featured = featured;
            }
            post.slug = slugify(&post.title);
            post.updated_at = Utc::now();

            let updated = post.clone();
            self.persist(&next).await?;
            *posts = next;
            updated
        };

        if remove_cover {
            self.images.remove(id).await?;
        } else if let Some(upload) = image {
            self.spawn_attach(id.to_string(), upload);
        }

        updated.cover_image = self.images.get(id).await;
        Ok(Some(updated))
    }

    /// Remove the record and cascade-delete its attachment. A no-op for an
    /// unknown id; the attachment removal runs regardless so no orphan can
    /// outlive its post.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut posts = self.posts.lock().await;
            if let Some(index) = posts.iter().position(|post| post.id == id) {
                let mut next = posts.clone();
                next.remove(index);
                self.persist(&next).await?;
                *posts = next;
            }
        }

        self.images.remove(id).await?;
        Ok(())
    }

    /// Owned copy of the record with its attachment resolved, or `None`.
    pub async fn get_by_id(&self, id: &str) -> Option<Post> {
        let post = {
            let posts = self.posts.lock().await;
            posts.iter().find(|post| post.id == id).cloned()
        };
        match post {
            Some(mut post) => {
                post.cover_image = self.images.get(&post.id).await;
                Some(post)
            }
            None => None,
        }
    }

    /// First record in collection order whose slug matches. Slugs are not
    /// unique, so later records with the same slug are shadowed.
    pub async fn get_by_slug(&self, slug: &str) -> Option<Post> {
        let post = {
            let posts = self.posts.lock().await;
            posts.iter().find(|post| post.slug == slug).cloned()
        };
        match post {
            Some(mut post) => {
                post.cover_image = self.images.get(&post.id).await;
                Some(post)
            }
            None => None,
        }
    }

    /// All records in insertion order, attachments resolved.
    pub async fn list(&self) -> Vec<Post> {
        let mut posts = self.posts.lock().await.clone();
        for post in &mut posts {
            post.cover_image = self.images.get(&post.id).await;
        }
        posts
    }

    async fn persist(&self, posts: &[Post]) -> Result<(), StoreError> {
        let json = serde_json::to_string(posts)?;
        self.documents.write(POSTS_KEY, &json).await?;
        Ok(())
    }

    fn spawn_attach(&self, post_id: String, upload: ImageUpload) {
        let images = self.images.clone();
        tokio::spawn(async move {
            if let Err(err) = images.save(&post_id, upload).await {
                tracing::warn!("Cover image for post {} not attached: {}", post_id, err);
            }
        });
    }
}

fn normalize_excerpt(excerpt: Option<String>) -> Option<String> {
    excerpt.filter(|text| !text.trim().is_empty())
}
