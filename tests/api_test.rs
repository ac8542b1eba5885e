//! HTTP round-trips against a server on an ephemeral port: the login gate,
//! post CRUD through the REST surface, multipart cover upload, and the
//! maintenance endpoint.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;

use tinta::auth::SessionStore;
use tinta::config::Config;
use tinta::db;
use tinta::db::documents::{DocumentStore, SqliteDocumentStore};
use tinta::routes;
use tinta::state::AppState;
use tinta::store::{CoverImageStore, PostStore};

const PASSWORD: &str = "correct-horse";

struct TestApp {
    base_url: String,
    client: reqwest::Client,
    // Held so the database outlives the server task
    _tmp: TempDir,
}

async fn spawn_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("tinta.db")).unwrap();
    db::run_migrations(&pool).unwrap();

    let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));
    let images = Arc::new(CoverImageStore::open(documents.clone()).await.unwrap());
    let posts = Arc::new(PostStore::open(documents, images.clone()).await.unwrap());

    let mut config = Config::default();
    config.auth.password = Some(PASSWORD.to_string());

    let state = AppState {
        config,
        posts,
        images,
        sessions: Arc::new(Mutex::new(SessionStore::new())),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();

    TestApp {
        base_url: format!("http://{}", addr),
        client,
        _tmp: tmp,
    }
}

impl TestApp {
    async fn login(&self) {
        let response = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&serde_json::json!({ "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    fn post_form(&self, title: &str) -> multipart::Form {
        multipart::Form::new()
            .text("title", title.to_string())
            .text("content", "Body text")
            .text("category", "general")
            .text("tags", "rust, blog")
            .text("status", "published")
    }

    async fn create_post(&self, title: &str) -> Value {
        let response = self
            .client
            .post(format!("{}/api/posts", self.base_url))
            .multipart(self.post_form(title))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_mutations_require_a_session() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/posts", app.base_url))
        .multipart(app.post_form("Nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = app
        .client
        .delete(format!("{}/api/posts/some-id", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/auth/login", app.base_url))
        .json(&serde_json::json!({ "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_post_crud_round_trip() {
    let app = spawn_app().await;
    app.login().await;

    let created = app.create_post("Café com Leite!").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["slug"], "cafe-com-leite");
    assert_eq!(created["tags"], serde_json::json!(["rust", "blog"]));
    assert_eq!(created["createdAt"], created["updatedAt"]);

    // Lookup by id and by slug
    let by_id: Value = app
        .client
        .get(format!("{}/api/posts/{}", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_id["title"], "Café com Leite!");

    let by_slug: Value = app
        .client
        .get(format!("{}/api/posts/slug/cafe-com-leite", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_slug["id"], id.as_str());

    // Update the title; the slug follows
    let response = app
        .client
        .put(format!("{}/api/posts/{}", app.base_url, id))
        .multipart(multipart::Form::new().text("title", "Chá Gelado"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["slug"], "cha-gelado");
    assert_eq!(updated["content"], "Body text");

    // Delete, then both lookups 404
    let response = app
        .client
        .delete(format!("{}/api/posts/{}", app.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = app
        .client
        .get(format!("{}/api/posts/{}", app.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unknown_id_update_returns_404() {
    let app = spawn_app().await;
    app.login().await;

    let response = app
        .client
        .put(format!("{}/api/posts/no-such-id", app.base_url))
        .multipart(multipart::Form::new().text("title", "Ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let app = spawn_app().await;
    app.login().await;

    app.create_post("Published One").await;
    let response = app
        .client
        .post(format!("{}/api/posts", app.base_url))
        .multipart(
            multipart::Form::new()
                .text("title", "Draft One")
                .text("content", "Body text")
                .text("category", "general")
                .text("status", "draft"),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let all: Vec<Value> = app
        .client
        .get(format!("{}/api/posts", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let published: Vec<Value> = app
        .client
        .get(format!("{}/api/posts?status=published", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["title"], "Published One");
}

#[tokio::test]
async fn test_missing_required_fields_are_rejected() {
    let app = spawn_app().await;
    app.login().await;

    let response = app
        .client
        .post(format!("{}/api/posts", app.base_url))
        .multipart(multipart::Form::new().text("title", "Only a Title"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_cover_upload_resolves_then_remove_cover_clears_it() {
    let app = spawn_app().await;
    app.login().await;

    let form = app.post_form("With Cover").part(
        "cover",
        multipart::Part::bytes(b"\x89PNG\r\n\x1a\nopaque-payload".to_vec())
            .file_name("cover.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = app
        .client
        .post(format!("{}/api/posts", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // The attachment save is fire-and-forget; poll until it resolves.
    let mut cover = None;
    for _ in 0..50 {
        let post: Value = app
            .client
            .get(format!("{}/api/posts/{}", app.base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if let Some(data) = post["coverImage"].as_str() {
            cover = Some(data.to_string());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let cover = cover.expect("cover image never resolved");
    assert!(cover.starts_with("data:image/png;base64,"));

    // removeCover clears the attachment even alongside a new upload
    let form = multipart::Form::new().text("removeCover", "true").part(
        "cover",
        multipart::Part::bytes(b"\x89PNG\r\n\x1a\nanother".to_vec())
            .file_name("other.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let updated: Value = app
        .client
        .put(format!("{}/api/posts/{}", app.base_url, id))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(updated["coverImage"].is_null());
}

#[tokio::test]
async fn test_non_image_cover_is_rejected() {
    let app = spawn_app().await;
    app.login().await;

    let form = app.post_form("Bad Cover").part(
        "cover",
        multipart::Part::bytes(b"just some text".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = app
        .client
        .post(format!("{}/api/posts", app.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    // The record itself is created; the rejected encode leaves no attachment.
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let post: Value = app
        .client
        .get(format!("{}/api/posts/{}", app.base_url, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(post["coverImage"].is_null());
}

#[tokio::test]
async fn test_evict_endpoint_reports_removed_count() {
    let app = spawn_app().await;
    app.login().await;

    let response = app
        .client
        .post(format!("{}/api/images/evict", app.base_url))
        .json(&serde_json::json!({ "maxAgeDays": 30 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed"], 0);
}
