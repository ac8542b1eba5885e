use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::AdminSession;
use crate::state::AppState;
use crate::store::{ImageUpload, Post, PostDraft, PostPatch, PostStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/posts/slug/{slug}", get(get_post_by_slug))
        .route("/api/images/evict", post(evict_images))
}

// -- Request types --

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<PostStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictRequest {
    pub max_age_days: Option<i64>,
}

/// Fields collected from a create/update multipart form. Everything is
/// optional at parse time; create enforces its required fields afterwards.
#[derive(Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    tags: Option<String>,
    excerpt: Option<String>,
    status: Option<PostStatus>,
    featured: Option<bool>,
    remove_cover: bool,
    cover: Option<ImageUpload>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "cover" {
            let filename = field.file_name().unwrap_or("cover").to_string();
            let media_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            // An empty file input still submits a part; treat it as absent.
            if !bytes.is_empty() {
                form.cover = Some(ImageUpload {
                    bytes,
                    filename,
                    media_type,
                });
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "title" => form.title = Some(text),
            "content" => form.content = Some(text),
            "category" => form.category = Some(text),
            "tags" => form.tags = Some(text),
            "excerpt" => form.excerpt = Some(text),
            "status" => form.status = Some(parse_status(&text)?),
            "featured" => form.featured = Some(parse_bool(&text)),
            "removeCover" => form.remove_cover = parse_bool(&text),
            _ => {}
        }
    }

    Ok(form)
}

fn parse_status(value: &str) -> Result<PostStatus, AppError> {
    match value {
        "draft" => Ok(PostStatus::Draft),
        "published" => Ok(PostStatus::Published),
        other => Err(AppError::BadRequest(format!("Unknown status: {}", other))),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "true" | "1" | "on")
}

// -- Handlers --

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Post>> {
    let mut posts = state.posts.list().await;
    if let Some(status) = query.status {
        posts.retain(|post| post.status == status);
    }
    Json(posts)
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Post>> {
    state
        .posts
        .get_by_id(&id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Post>> {
    state
        .posts
        .get_by_slug(&slug)
        .await
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_post_form(multipart).await?;

    let title = form.title.unwrap_or_default();
    let content = form.content.unwrap_or_default();
    let category = form.category.unwrap_or_default();
    if title.trim().is_empty() || content.trim().is_empty() || category.trim().is_empty() {
        return Err(AppError::BadRequest(
            "title, content and category are required".to_string(),
        ));
    }

    let draft = PostDraft {
        title,
        content,
        category,
        tags: form.tags.unwrap_or_default(),
        excerpt: form.excerpt,
        status: form.status.unwrap_or_default(),
        featured: form.featured.unwrap_or(false),
    };

    let post = state.posts.create(draft, form.cover).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Post>> {
    let form = read_post_form(multipart).await?;

    let patch = PostPatch {
        title: form.title,
        content: form.content,
        category: form.category,
        tags: form.tags,
        excerpt: form.excerpt,
        status: form.status,
        featured: form.featured,
    };

    state
        .posts
        .update(&id, patch, form.cover, form.remove_cover)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.posts.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn evict_images(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(body): Json<EvictRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let max_age_days = body.max_age_days.unwrap_or(30);
    if max_age_days < 0 {
        return Err(AppError::BadRequest(
            "maxAgeDays must be non-negative".to_string(),
        ));
    }

    let removed = state.images.evict_older_than(max_age_days).await?;
    Ok(Json(json!({ "removed": removed })))
}
