use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use vidtube_api::{
    config::Config,
    db::{CredentialStore, MemoryStore, StoreError},
    models::{
        media::MediaAsset,
        user::{MediaSlot, NewUser, User},
    },
    routes::create_router,
    services::{
        object_store::{DiskObjectStore, ObjectStore, ObjectStoreError},
        password::hash_password,
        tokens::TokenService,
    },
    AppState,
};

pub const MEDIA_BASE_URL: &str = "http://localhost:8000/media";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub memory: Arc<MemoryStore>,
    pub media_dir: TempDir,
    pub temp_dir: TempDir,
}

/// Router over an in-memory credential store and a disk object store in a
/// temp dir.
#[allow(dead_code)]
pub fn spawn_app() -> TestApp {
    spawn_app_with(
        |memory| memory as Arc<dyn CredentialStore>,
        |disk| Arc::new(disk) as Arc<dyn ObjectStore>,
    )
}

/// Same as `spawn_app`, letting a test wrap either store.
#[allow(dead_code)]
pub fn spawn_app_with(
    users: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn CredentialStore>,
    objects: impl FnOnce(DiskObjectStore) -> Arc<dyn ObjectStore>,
) -> TestApp {
    let media_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();

    let config = Config {
        upload_temp_dir: temp_dir.path().to_string_lossy().to_string(),
        media_dir: media_dir.path().to_string_lossy().to_string(),
        media_base_url: MEDIA_BASE_URL.into(),
        bcrypt_cost: 4,
        store_timeout_seconds: 1,
        ..Config::default()
    };
    let tokens = TokenService::from_config(&config).unwrap();

    let memory = Arc::new(MemoryStore::new());
    let state = AppState {
        config: Arc::new(config),
        users: users(memory.clone()),
        tweets: memory.clone(),
        objects: objects(DiskObjectStore::new(media_dir.path(), MEDIA_BASE_URL)),
        tokens: Arc::new(tokens),
        redis: None,
    };

    TestApp {
        router: create_router(state.clone()),
        state,
        memory,
        media_dir,
        temp_dir,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub async fn seed_user(&self, username: &str, password: &str) -> User {
        self.memory
            .create_user(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                full_name: format!("{username} Example"),
                password_hash: hash_password(password, 4).unwrap(),
                avatar_url: format!("{MEDIA_BASE_URL}/{username}.png"),
                cover_image_url: None,
            })
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Logs in and returns `(access_token, refresh_token)`.
    pub async fn login(&self, username: &str, password: &str) -> (String, String) {
        let response = self
            .send(json_request(
                "POST",
                "/api/v1/users/login",
                serde_json::json!({ "username": username, "password": password }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        (
            response.body["data"]["accessToken"].as_str().unwrap().to_string(),
            response.body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    pub fn media_files(&self) -> Vec<String> {
        list_files(self.media_dir.path())
    }

    pub fn temp_files(&self) -> Vec<String> {
        list_files(self.temp_dir.path())
    }

    pub async fn user(&self, id: Uuid) -> User {
        self.memory.find_by_id(id).await.unwrap().unwrap()
    }
}

fn list_files(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find(|c| c.starts_with(&prefix))
    }
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn bearer_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Hand-built multipart/form-data body.
#[allow(dead_code)]
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

#[allow(dead_code)]
impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----vidtube-test-boundary".into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", self.boundary),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

/// A registration form for `username` with an avatar and optional cover.
#[allow(dead_code)]
pub fn registration(username: &str, with_cover: bool) -> MultipartBody {
    let form = MultipartBody::new()
        .text("fullName", "Test Person")
        .text("username", username)
        .text("email", &format!("{username}@example.com"))
        .text("password", "hunter22")
        .file("avatar", "me.png", b"avatar-bytes");
    if with_cover {
        form.file("coverImage", "cover.png", b"cover-bytes")
    } else {
        form
    }
}

/// How long a late insert keeps the caller waiting; longer than the test
/// store timeout.
#[allow(dead_code)]
pub const LATE_REPLY: Duration = Duration::from_secs(2);

/// How the wrapped store misbehaves on `create_user`.
#[allow(dead_code)]
pub enum CreateFailure {
    Error,
    /// A concurrent registration won the unique index after the pre-check.
    Duplicate,
    /// The row is written at once but the reply arrives after `LATE_REPLY`.
    LateCommit,
    /// Fails, but only after `LATE_REPLY`.
    LateError,
}

/// Credential store whose user inserts fail; everything else is delegated.
#[allow(dead_code)]
pub struct FailingCreate {
    pub inner: Arc<MemoryStore>,
    pub failure: CreateFailure,
}

#[async_trait]
impl CredentialStore for FailingCreate {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_identifier(identifier).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_username(username).await
    }

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        self.inner.identity_taken(username, email).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        match self.failure {
            CreateFailure::Error => Err(StoreError::Backend(anyhow::anyhow!("connection reset by peer"))),
            CreateFailure::Duplicate => Err(StoreError::Duplicate("users_username_key".into())),
            CreateFailure::LateCommit => {
                let user = self.inner.create_user(new_user).await?;
                tokio::time::sleep(LATE_REPLY).await;
                Ok(user)
            }
            CreateFailure::LateError => {
                tokio::time::sleep(LATE_REPLY).await;
                Err(StoreError::Backend(anyhow::anyhow!("canceling statement due to statement timeout")))
            }
        }
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError> {
        self.inner.set_refresh_token(id, token_hash).await
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        self.inner.rotate_refresh_token(id, expected, replacement).await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        self.inner.update_password(id, password_hash).await
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        self.inner.update_account(id, full_name, email).await
    }

    async fn set_media_url(
        &self,
        id: Uuid,
        slot: MediaSlot,
        url: &str,
    ) -> Result<Option<User>, StoreError> {
        self.inner.set_media_url(id, slot, url).await
    }
}

/// Disk store that refuses uploads of staged files whose name starts with
/// `fail_prefix` (staged names start with the form field name).
#[allow(dead_code)]
pub struct FlakyObjects {
    pub inner: DiskObjectStore,
    pub fail_prefix: &'static str,
}

#[async_trait]
impl ObjectStore for FlakyObjects {
    async fn upload(&self, path: &Path) -> Result<MediaAsset, ObjectStoreError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with(self.fail_prefix) {
            return Err(ObjectStoreError::Unavailable("upstream timed out".into()));
        }
        self.inner.upload(path).await
    }

    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError> {
        self.inner.delete(public_id).await
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        self.inner.public_id_from_url(url)
    }
}
