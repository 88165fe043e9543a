use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use bookstore_api::app::{build_app, AppServices};
use bookstore_auth::{
    Identity, IdentityStore, InMemoryIdentityStore, NewIdentity, Role, StoreError, TokenSettings,
};
use bookstore_books::{Book, BookRepository, BookStoreError};
use bookstore_core::{BookId, SystemClock, UserId};
use bookstore_infra::{InMemoryBookRepository, LocalFileStorage};

const SECRET: &str = "test-secret";
const ISSUER: &str = "bookstore-api";
const AUDIENCE: &str = "bookstore-clients";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    uploads: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(Arc::new(InMemoryIdentityStore::new()), None).await
    }

    async fn spawn_with_admin(username: &str, password: &str) -> Self {
        Self::spawn_with(Arc::new(InMemoryIdentityStore::new()), Some((username, password))).await
    }

    async fn spawn_with(store: Arc<dyn IdentityStore>, admin: Option<(&str, &str)>) -> Self {
        Self::spawn_with_books(store, Arc::new(InMemoryBookRepository::new()), admin).await
    }

    async fn spawn_with_books(
        store: Arc<dyn IdentityStore>,
        books: Arc<dyn BookRepository>,
        admin: Option<(&str, &str)>,
    ) -> Self {
        let uploads = tempfile::tempdir().expect("failed to create upload dir");
        let files = LocalFileStorage::init(uploads.path(), false)
            .await
            .expect("failed to init file storage");

        let settings = TokenSettings {
            secret: SECRET.to_string(),
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
            lifetime: ChronoDuration::minutes(60),
        };

        // Same wiring as prod, in-memory stores, ephemeral port.
        let services = AppServices::new(
            store,
            books,
            Arc::new(files),
            &settings,
            ChronoDuration::minutes(30),
            Arc::new(SystemClock),
        )
        .expect("failed to build services");

        if let Some((username, password)) = admin {
            services
                .accounts
                .ensure_admin(username, password)
                .await
                .expect("failed to seed admin");
        }

        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            uploads,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn stored_files(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .expect("failed to read upload dir")
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, issuer: &str, audience: &str, subject: UserId, expires_in: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = json!({
        "UserId": subject.to_string(),
        "iss": issuer,
        "aud": audience,
        "iat": now.timestamp(),
        "exp": (now + expires_in).timestamp(),
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn register(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/api/users/register"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/api/users/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn login_token(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> String {
    let res = login(client, srv, username, password).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn create_book(client: &reqwest::Client, srv: &TestServer, token: &str, title: &str) -> serde_json::Value {
    let res = client
        .post(srv.url("/api/books"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "author": "N. K. Jemisin", "price": 9.99 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_role_gates_end_to_end() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Register
    let res = register(&client, &srv, "alice", "secret123").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["username"], "alice");
    assert_eq!(created["role"], "User");
    assert!(created["id"].as_str().is_some());
    assert_eq!(created["createdAt"], created["updatedAt"]);
    assert!(created.get("credentialHash").is_none());
    assert!(created.get("credential_hash").is_none());

    // Login
    let token = login_token(&client, &srv, "alice", "secret123").await;

    // Authenticated-only endpoints accept the token
    let res = client
        .get(srv.url("/api/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: serde_json::Value = res.json().await.unwrap();
    assert_eq!(me["id"], created["id"]);
    assert_eq!(me["role"], "User");

    let book = create_book(&client, &srv, &token, "The Fifth Season").await;
    let book_id = book["id"].as_str().unwrap();

    // Admin-only endpoint rejects a User
    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    // Wrong password
    let res = login(&client, &srv, "alice", "wrongpass").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Duplicate registration
    let res = register(&client, &srv, "alice", "another-pass").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_username");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    assert_eq!(register(&client, &srv, "bob", "hunter22").await.status(), StatusCode::CREATED);

    let wrong_pass = login(&client, &srv, "bob", "nope").await;
    let unknown_user = login(&client, &srv, "nobody", "nope").await;

    assert_eq!(wrong_pass.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: serde_json::Value = wrong_pass.json().await.unwrap();
    let b: serde_json::Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn registration_input_is_validated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for (username, password) in [("", "secret123"), ("   ", "secret123"), ("carol", "")] {
        let res = register(&client, &srv, username, password).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{username:?}/{password:?}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
    }

    for (path, body) in [
        ("/api/users/register", json!({ "username": "alice" })),
        ("/api/users/login", json!({ "password": "secret123" })),
        ("/api/users/register", json!(["alice", "secret123"])),
    ] {
        let res = client.post(srv.url(path)).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path} {body}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn protected_endpoints_reject_missing_and_invalid_tokens() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = register(&client, &srv, "dave", "secret123").await;
    let created: serde_json::Value = res.json().await.unwrap();
    let subject: UserId = created["id"].as_str().unwrap().parse().unwrap();

    let tokens = [
        None,
        Some("not-a-jwt".to_string()),
        Some(mint_jwt(SECRET, ISSUER, AUDIENCE, subject, ChronoDuration::minutes(-1))),
        Some(mint_jwt("other-secret", ISSUER, AUDIENCE, subject, ChronoDuration::minutes(10))),
        Some(mint_jwt(SECRET, "someone-else", AUDIENCE, subject, ChronoDuration::minutes(10))),
        Some(mint_jwt(SECRET, ISSUER, "other-clients", subject, ChronoDuration::minutes(10))),
    ];

    for token in tokens {
        let mut req = client.get(srv.url("/api/users/me"));
        if let Some(t) = &token {
            req = req.bearer_auth(t);
        }
        let res = req.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "token {token:?}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "unauthorized");
    }

    // A correctly minted token for the same subject is accepted.
    let good = mint_jwt(SECRET, ISSUER, AUDIENCE, subject, ChronoDuration::minutes(10));
    let res = client
        .get(srv.url("/api/users/me"))
        .bearer_auth(good)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_endpoints_ignore_bad_tokens() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/api/books"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let books: serde_json::Value = res.json().await.unwrap();
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn unknown_subject_is_authenticated_without_role() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Valid signature, but the subject does not exist in the store.
    let token = mint_jwt(SECRET, ISSUER, AUDIENCE, UserId::new(), ChronoDuration::minutes(10));

    let book = create_book(&client, &srv, &token, "Ghost Writer").await;
    let book_id = book["id"].as_str().unwrap();

    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/api/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn seeded_admin_can_delete_books() {
    let srv = TestServer::spawn_with_admin("root", "rootpass").await;
    let client = reqwest::Client::new();

    let admin = login_token(&client, &srv, "root", "rootpass").await;
    let book = create_book(&client, &srv, &admin, "The Obelisk Gate").await;
    let book_id = book["id"].as_str().unwrap();

    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/api/books/{book_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_crud_and_validation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    register(&client, &srv, "erin", "secret123").await;
    let token = login_token(&client, &srv, "erin", "secret123").await;

    // Unauthenticated create
    let res = client
        .post(srv.url("/api/books"))
        .json(&json!({ "title": "x", "author": "y", "price": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Invalid input
    let res = client
        .post(srv.url("/api/books"))
        .bearer_auth(&token)
        .json(&json!({ "title": "", "author": "y", "price": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Wrong field type
    let res = client
        .post(srv.url("/api/books"))
        .bearer_auth(&token)
        .json(&json!({ "title": "x", "author": "y", "price": "cheap" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let book = create_book(&client, &srv, &token, "The Stone Sky").await;
    let book_id = book["id"].as_str().unwrap();

    let res = client
        .put(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&token)
        .json(&json!({ "title": "The Stone Sky (2nd ed.)", "author": "N. K. Jemisin", "price": 11.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "The Stone Sky (2nd ed.)");
    assert_eq!(updated["createdAt"], book["createdAt"]);

    let res = client.get(srv.url("/api/books")).send().await.unwrap();
    let all: serde_json::Value = res.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);

    let res = client.get(srv.url("/api/books/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::now_v7();
    let res = client
        .put(srv.url(&format!("/api/books/{missing}")))
        .bearer_auth(&token)
        .json(&json!({ "title": "a", "author": "b", "price": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_uploads_book_image_and_it_is_served() {
    let srv = TestServer::spawn_with_admin("root", "rootpass").await;
    let client = reqwest::Client::new();

    let admin = login_token(&client, &srv, "root", "rootpass").await;
    let book = create_book(&client, &srv, &admin, "Cover Story").await;
    let book_id = book["id"].as_str().unwrap();

    let image = vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4];
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(image.clone())
            .file_name("cover.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let res = client
        .put(srv.url(&format!("/api/books/image/{book_id}")))
        .bearer_auth(&admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    let stored = updated["image"].as_str().unwrap().to_string();
    assert!(stored.ends_with(".png"));
    assert_ne!(stored, "cover.png");

    let res = client.get(srv.url(&format!("/api/storage/{stored}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.bytes().await.unwrap().to_vec(), image);

    // Deleting the book removes its image.
    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = client.get(srv.url(&format!("/api/storage/{stored}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_upload_requires_admin_and_a_non_empty_file() {
    let srv = TestServer::spawn_with_admin("root", "rootpass").await;
    let client = reqwest::Client::new();

    register(&client, &srv, "frank", "secret123").await;
    let user = login_token(&client, &srv, "frank", "secret123").await;
    let admin = login_token(&client, &srv, "root", "rootpass").await;
    let book = create_book(&client, &srv, &user, "Plain Cover").await;
    let book_id = book["id"].as_str().unwrap();

    let file = |bytes: Vec<u8>| {
        reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name("c.jpg"),
        )
    };

    let res = client
        .put(srv.url(&format!("/api/books/image/{book_id}")))
        .bearer_auth(&user)
        .multipart(file(vec![1, 2, 3]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .put(srv.url(&format!("/api/books/image/{book_id}")))
        .bearer_auth(&admin)
        .multipart(file(Vec::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_rejects_traversal_names() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/api/storage/..%2Fsecret")).await.unwrap();
    assert!(res.status() == StatusCode::BAD_REQUEST || res.status() == StatusCode::NOT_FOUND);
}

/// Book repository where every update races with a delete and loses.
struct VanishingBooks(InMemoryBookRepository);

#[async_trait]
impl BookRepository for VanishingBooks {
    async fn list(&self) -> Result<Vec<Book>, BookStoreError> {
        self.0.list().await
    }

    async fn get(&self, id: BookId) -> Result<Option<Book>, BookStoreError> {
        self.0.get(id).await
    }

    async fn insert(&self, book: Book) -> Result<Book, BookStoreError> {
        self.0.insert(book).await
    }

    async fn update(&self, book: Book) -> Result<Option<Book>, BookStoreError> {
        self.0.delete(book.id).await?;
        Ok(None)
    }

    async fn delete(&self, id: BookId) -> Result<Option<Book>, BookStoreError> {
        self.0.delete(id).await
    }
}

#[tokio::test]
async fn upload_for_a_concurrently_deleted_book_leaves_no_file() {
    let srv = TestServer::spawn_with_books(
        Arc::new(InMemoryIdentityStore::new()),
        Arc::new(VanishingBooks(InMemoryBookRepository::new())),
        Some(("root", "rootpass")),
    )
    .await;
    let client = reqwest::Client::new();

    let admin = login_token(&client, &srv, "root", "rootpass").await;
    let book = create_book(&client, &srv, &admin, "Gone Girl").await;
    let book_id = book["id"].as_str().unwrap();

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![1, 2, 3])
            .file_name("cover.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let res = client
        .put(srv.url(&format!("/api/books/image/{book_id}")))
        .bearer_auth(&admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(srv.stored_files(), 0);
}

/// Identity store whose backend is unreachable.
struct DownStore;

#[async_trait]
impl IdentityStore for DownStore {
    async fn find_by_username(&self, _username: &str) -> Result<Option<Identity>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find_by_id(&self, _id: UserId) -> Result<Option<Identity>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn insert(&self, _identity: NewIdentity) -> Result<Identity, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn store_outage_during_augmentation_is_a_server_error() {
    let srv = TestServer::spawn_with(Arc::new(DownStore), None).await;
    let client = reqwest::Client::new();

    let token = mint_jwt(SECRET, ISSUER, AUDIENCE, UserId::new(), ChronoDuration::minutes(10));
    let res = client
        .get(srv.url("/api/books"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "store_unavailable");

    // Anonymous requests never reach the store.
    let res = client.get(srv.url("/api/books")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = login(&client, &srv, "anyone", "pw").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn role_changes_apply_after_cache_expiry_only() {
    let store = Arc::new(InMemoryIdentityStore::new());
    let srv = TestServer::spawn_with(store.clone(), None).await;
    let client = reqwest::Client::new();

    let res = register(&client, &srv, "grace", "secret123").await;
    let created: serde_json::Value = res.json().await.unwrap();
    let id: UserId = created["id"].as_str().unwrap().parse().unwrap();
    let token = login_token(&client, &srv, "grace", "secret123").await;

    // Populates the by-id cache entry with role User.
    let book = create_book(&client, &srv, &token, "Stale Roles").await;
    let book_id = book["id"].as_str().unwrap();

    assert!(store.set_role(id, Role::Admin).unwrap());

    // Still cached as User: bounded staleness, no invalidation on write.
    let res = client
        .delete(srv.url(&format!("/api/books/{book_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
