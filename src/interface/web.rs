//! ブラウザフォームUI。
//!
//! axumのJSON APIと埋め込みのシングルページUI。CLIメニューと同じ
//! JSONカタログファイルを読み書きするので、どちらで書いた台帳も
//! もう一方でそのまま開ける。
//!
//! APIエラーは `{"error": "..."}` ボディと対応するステータスコードで返す。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use rust_embed::Embed;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::application::error::AppError;
use crate::application::service::CatalogService;
use crate::domain::error::DomainError;
use crate::domain::model::book::{Book, BookPatch};
use crate::infra::json_store::JsonCatalogRepository;

// =============================================================================
// Public entry point
// =============================================================================

/// フォームUIサーバを起動する。
pub async fn run(data_file: PathBuf, bind: &str, port: u16) -> anyhow::Result<()> {
    let repo = JsonCatalogRepository::new(data_file);
    let state = AppState {
        service: RwLock::new(CatalogService::new(repo)),
    };
    let router = build_router(state);

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("form UI listening on http://{addr}");
    axum::serve(listener, router)
        .await
        .context("run HTTP server")?;
    Ok(())
}

// =============================================================================
// Application State / Router
// =============================================================================

pub struct AppState {
    pub service: RwLock<CatalogService<JsonCatalogRepository>>,
}

type SharedState = Arc<AppState>;

pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/books", get(list_books).post(add_book))
        .route("/api/v1/books.csv", get(download_csv))
        .route(
            "/api/v1/books/{isbn}",
            get(get_book).post(update_book).delete(delete_book),
        )
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .fallback(static_files)
        .with_state(shared)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound("API route not found".to_string())
}

// =============================================================================
// DTOs
// =============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NewBookRequest {
    isbn: String,
    title: String,
    author: String,
    #[serde(deserialize_with = "crate::domain::model::book::de_year")]
    year: i32,
    #[serde(default, deserialize_with = "crate::domain::model::book::de_opt_copies")]
    copies: Option<u32>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// 一覧と検索を兼ねる。`?q=` が付けば絞り込み、無ければ全件。
async fn list_books(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let service = state.service.read().await;
    let books = service.search(query.q.as_deref().unwrap_or(""))?;
    Ok(Json(books))
}

async fn add_book(
    State(state): State<SharedState>,
    req: Result<Json<NewBookRequest>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let Json(req) = req.map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let book = Book {
        isbn: req.isbn,
        title: req.title,
        author: req.author,
        year: req.year,
        copies: req.copies.unwrap_or(1),
    };

    let service = state.service.write().await;
    service.add_book(book.clone())?;
    Ok(Json(book))
}

async fn get_book(
    State(state): State<SharedState>,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, ApiError> {
    let service = state.service.read().await;
    let book = service
        .get_book(&isbn)?
        .ok_or_else(|| ApiError::NotFound(format!("book not found: {isbn}")))?;
    Ok(Json(book))
}

async fn update_book(
    State(state): State<SharedState>,
    Path(isbn): Path<String>,
    req: Result<Json<BookPatch>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let Json(patch) = req.map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let service = state.service.write().await;
    service.update_book(&isbn, patch)?;

    let updated = service
        .get_book(&isbn)?
        .ok_or_else(|| ApiError::Internal("updated book was not found".to_string()))?;
    Ok(Json(updated))
}

async fn delete_book(
    State(state): State<SharedState>,
    Path(isbn): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let service = state.service.write().await;
    service.delete_book(&isbn)?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// カタログ全体をCSVとしてダウンロードさせる。
/// ファイルエクスポートと同じバイト列。
async fn download_csv(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let service = state.service.read().await;
    let content = service.render_csv()?;

    let mut response = (StatusCode::OK, content).into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    response.headers_mut().insert(
        axum::http::header::CONTENT_DISPOSITION,
        axum::http::HeaderValue::from_static("attachment; filename=\"books.csv\""),
    );
    Ok(response)
}

// =============================================================================
// Error mapping
// =============================================================================

pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(DomainError::DuplicateIsbn(isbn)) => {
                ApiError::Conflict(format!("book already exists: {isbn}"))
            }
            AppError::Domain(DomainError::BookNotFound(isbn)) => {
                ApiError::NotFound(format!("book not found: {isbn}"))
            }
            AppError::Domain(DomainError::EmptyIsbn) => {
                ApiError::BadRequest("isbn must not be empty".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// =============================================================================
// Static File Serving
// =============================================================================

#[derive(Embed)]
#[folder = "ui/"]
struct Assets;

/// 埋め込みフォームUIを返す。一致するファイルが無ければindex.html。
async fn static_files(uri: axum::http::Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if !path.is_empty() {
        if let Some(content) = Assets::get(path) {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            return (
                [(axum::http::header::CONTENT_TYPE, mime.as_ref())],
                content.data,
            )
                .into_response();
        }
    }
    match Assets::get("index.html") {
        Some(content) => (
            [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
            content.data,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "UI assets missing from build").into_response(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router(dir: &tempfile::TempDir) -> Router {
        let repo = JsonCatalogRepository::new(dir.path().join("books.json"));
        let state = AppState {
            service: RwLock::new(CatalogService::new(repo)),
        };
        build_router(state)
    }

    async fn response_body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .expect("response body must be readable");
        serde_json::from_slice(&bytes).expect("response body must be valid JSON")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request must build")
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request must build")
    }

    #[tokio::test]
    async fn add_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"111","title":"A","author":"B","year":2000,"copies":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router.oneshot(get_req("/api/v1/books/111")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = response_body_json(resp).await;
        assert_eq!(json["title"], "A");
        assert_eq!(json["year"], 2000);
    }

    #[tokio::test]
    async fn duplicate_add_returns_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);
        let body = r#"{"isbn":"111","title":"A","author":"B","year":2000}"#;

        let resp = router
            .clone()
            .oneshot(post_json("/api/v1/books", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .oneshot(post_json("/api/v1/books", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = response_body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn blank_isbn_returns_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"  ","title":"A","author":"B","year":2000}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_missing_book_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router.oneshot(get_req("/api/v1/books/404")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_missing_book_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/books/404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_changes_only_patched_fields() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"111","title":"A","author":"B","year":2000,"copies":1}"#,
            ))
            .await
            .unwrap();

        let resp = router
            .clone()
            .oneshot(post_json("/api/v1/books/111", r#"{"copies":5}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = response_body_json(resp).await;
        assert_eq!(json["copies"], 5);
        assert_eq!(json["title"], "A");
    }

    #[tokio::test]
    async fn update_with_unknown_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"111","title":"A","author":"B","year":2000}"#,
            ))
            .await
            .unwrap();

        let resp = router
            .oneshot(post_json("/api/v1/books/111", r#"{"publisher":"X"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_query_filters_results() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"1","title":"Rust Basics","author":"Steve","year":2019}"#,
            ))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"2","title":"Go in Action","author":"William","year":2015}"#,
            ))
            .await
            .unwrap();

        let resp = router
            .clone()
            .oneshot(get_req("/api/v1/books?q=go"))
            .await
            .unwrap();
        let json = response_body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["isbn"], "2");

        // クエリ無しは全件
        let resp = router.oneshot(get_req("/api/v1/books")).await.unwrap();
        let json = response_body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn csv_download_matches_export_format() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        router
            .clone()
            .oneshot(post_json(
                "/api/v1/books",
                r#"{"isbn":"1","title":"Rust Basics","author":"Steve","year":2019,"copies":2}"#,
            ))
            .await
            .unwrap();

        let resp = router
            .oneshot(get_req("/api/v1/books.csv"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/csv"));

        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(
            text,
            "ISBN,Title,Author,Year,Copies\n1,Rust Basics,Steve,2019,2\n"
        );
    }

    #[tokio::test]
    async fn unknown_api_route_returns_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router
            .oneshot(get_req("/api/v1/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = response_body_json(resp).await;
        assert_eq!(json["error"], "API route not found");
    }

    #[tokio::test]
    async fn root_serves_embedded_form_ui() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir);

        let resp = router.oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<html"));
    }
}
