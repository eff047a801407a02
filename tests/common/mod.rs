#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use foodgram::api::{self, AppState};
use foodgram::domain::{NewIngredient, NewTag};
use foodgram::images::MediaStore;
use foodgram::storage::{SqliteStorage, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// 1x1 transparent PNG
pub const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

pub fn png_data_url() -> String {
    format!("data:image/png;base64,{PNG_1X1}")
}

pub struct TestApp {
    pub app: Router,
    pub storage: Arc<SqliteStorage>,
    pub media: TempDir,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_page_size(6)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let media = tempfile::tempdir().unwrap();
        let state = AppState::new(
            storage.clone() as Arc<dyn Storage>,
            MediaStore::new(media.path(), "/media/"),
            page_size,
        );
        Self {
            app: api::router(state),
            storage,
            media,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "testserver");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Token {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Response {
            status,
            headers,
            text: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Registers a user through the API and logs them in. Returns `(id, token)`.
    pub async fn register(&self, username: &str) -> (i64, String) {
        let created = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": format!("{username}@example.com"),
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "s3cret-pass",
                }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
        let id = created.json()["id"].as_i64().unwrap();

        let login = self
            .post(
                "/api/auth/token/login/",
                None,
                json!({ "email": format!("{username}@example.com"), "password": "s3cret-pass" }),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.text);
        let token = login.json()["auth_token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Two tags (breakfast, dinner) and three ingredients. Returns their ids
    /// in insertion order.
    pub async fn seed_catalog(&self) -> (Vec<i64>, Vec<i64>) {
        self.storage
            .create_tags(&[
                NewTag {
                    name: "Breakfast".to_string(),
                    color: "#E26C2D".to_string(),
                    slug: "breakfast".to_string(),
                },
                NewTag {
                    name: "Dinner".to_string(),
                    color: "#49B64E".to_string(),
                    slug: "dinner".to_string(),
                },
            ])
            .await
            .unwrap();
        self.storage
            .create_ingredients(&[
                NewIngredient {
                    name: "flour".to_string(),
                    measurement_unit: "g".to_string(),
                },
                NewIngredient {
                    name: "milk".to_string(),
                    measurement_unit: "ml".to_string(),
                },
                NewIngredient {
                    name: "egg".to_string(),
                    measurement_unit: "pcs".to_string(),
                },
            ])
            .await
            .unwrap();
        let tags = self.storage.list_tags().await.unwrap();
        let mut ingredients: Vec<i64> = self
            .storage
            .list_ingredients()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        // flour, milk, egg
        ingredients.sort_unstable();
        (tags.iter().map(|t| t.id).collect(), ingredients)
    }

    pub async fn create_recipe(&self, token: &str, body: Value) -> Response {
        self.post("/api/recipes/", Some(token), body).await
    }
}

pub fn recipe_body(name: &str, tags: &[i64], ingredients: &[(i64, i64)], cooking_time: i64) -> Value {
    json!({
        "name": name,
        "text": "Mix and cook.",
        "cooking_time": cooking_time,
        "image": png_data_url(),
        "tags": tags,
        "ingredients": ingredients
            .iter()
            .map(|(id, amount)| json!({ "id": id, "amount": amount }))
            .collect::<Vec<_>>(),
    })
}
