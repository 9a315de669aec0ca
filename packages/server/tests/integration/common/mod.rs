use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ::common::storage::filesystem::FsBlobStore;
use reqwest::{Client, redirect::Policy};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tempfile::TempDir;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ServerConfig, StorageConfig,
};
use server::state::AppState;

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";
    pub const IMAGES: &str = "/api/v1/images";

    pub fn image(id: &str) -> String {
        format!("/api/v1/images/{id}")
    }
}

/// Minimal valid PNG header followed by filler. Enough for signature
/// sniffing; never decoded.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0xAB; 256]);
    bytes
}

/// A running test server backed by a throwaway SQLite file and blob
/// directory, both inside a tempdir that lives as long as the `TestApp`.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub blob_root: PathBuf,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
    /// `Location` header, when present.
    pub location: Option<String>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create tempdir");

        let db_path = dir.path().join("test.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = server::database::init_db(&db_url)
            .await
            .expect("Failed to initialize test database");

        let blob_root = dir.path().join("blobs");
        let blobs = FsBlobStore::new(blob_root.clone(), 10 * 1024 * 1024)
            .await
            .expect("Failed to create blob store");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig { url: db_url },
            auth: AuthConfig {
                jwt_secret: "test-secret-for-integration-tests".to_string(),
            },
            storage: StorageConfig {
                root: blob_root.clone(),
                max_upload_size: 10 * 1024 * 1024,
            },
        };

        let state = AppState {
            db: db.clone(),
            blobs: Arc::new(blobs),
            config: app_config,
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Redirects stay visible so 303 responses can be asserted directly.
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            client,
            db,
            blob_root,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Where a stored image's bytes should live on disk.
    pub fn blob_path(&self, id: &str, extension: &str) -> PathBuf {
        self.blob_root.join(format!("{id}.{extension}"))
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// GET returning the raw reqwest response, for asserting on streamed
    /// bytes and headers.
    pub async fn get_raw_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// POST a multipart upload with a `name` field and a `file` field.
    pub async fn upload_with_token(
        &self,
        display_name: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("name", display_name.to_string())
            .part("file", part);

        let res = self
            .client
            .post(self.url(routes::IMAGES))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// POST a multipart upload without a `name` field.
    pub async fn upload_without_name(
        &self,
        file_name: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .client
            .post(self.url(routes::IMAGES))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// POST a multipart upload without a `file` field.
    pub async fn upload_without_file(&self, display_name: &str, token: &str) -> TestResponse {
        let form = reqwest::multipart::Form::new().text("name", display_name.to_string());

        let res = self
            .client
            .post(self.url(routes::IMAGES))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Register a user and log in, returning the auth token.
    pub async fn create_authenticated_user(&self, username: &str, password: &str) -> String {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });

        let reg = self.post_without_token(routes::REGISTER, &body).await;
        assert_eq!(reg.status, 201, "Registration failed: {}", reg.text);

        let res = self.post_without_token(routes::LOGIN, &body).await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }

    /// Upload an image and return its `id`, looked up via the list endpoint.
    pub async fn upload_image(
        &self,
        display_name: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> String {
        let res = self
            .upload_with_token(display_name, file_name, file_bytes, token)
            .await;
        assert_eq!(res.status, 303, "Upload failed: {}", res.text);

        let list = self.get_with_token(routes::IMAGES, token).await;
        assert_eq!(list.status, 200, "List failed: {}", list.text);

        list.body["images"]
            .as_array()
            .expect("List response should contain 'images'")
            .iter()
            .rev()
            .find(|img| img["name"] == display_name)
            .and_then(|img| img["id"].as_str())
            .expect("Uploaded image should appear in the list")
            .to_string()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let location = res
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            text,
            body,
            location,
        }
    }
}
