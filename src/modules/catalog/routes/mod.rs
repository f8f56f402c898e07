//! Read-only HTTP handlers for books and opinions.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use shelf_http::error::AppError;

use super::models::{BookEntry, BookFilter, Isbn, OpinionEntry};
use super::store::{CatalogError, CatalogResult, CatalogStore, CatalogTx};

type SharedStore = Arc<dyn CatalogStore>;

/// Listing representation of a book.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub title: String,
    pub author: String,
    pub isbn: Isbn,
    pub category: String,
    /// Opinion resource paths.
    pub opinions: Vec<String>,
}

impl From<BookEntry> for BookResponse {
    fn from(entry: BookEntry) -> Self {
        Self {
            title: entry.book.title,
            author: entry.author.to_string(),
            isbn: entry.book.isbn,
            category: entry.category.to_string(),
            opinions: entry.opinion_ids.into_iter().map(opinion_path).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OpinionResponse {
    pub book: String,
    pub rate: u8,
    pub description: String,
}

impl From<OpinionEntry> for OpinionResponse {
    fn from(entry: OpinionEntry) -> Self {
        Self {
            book: entry.book.to_string(),
            rate: entry.opinion.rate,
            description: entry.opinion.description,
        }
    }
}

pub fn opinion_path(id: i64) -> String {
    format!("/opinions/{id}/")
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        if let Some(kind) = err.constraint_kind() {
            return AppError::conflict(vec![json!({ "constraint": kind.as_str() })], err.to_string());
        }
        match err {
            CatalogError::NotFound { .. } => AppError::not_found(err.to_string()),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/books/", get(list_books))
        .route("/books", get(list_books))
        .route("/opinions/", get(list_opinions))
        .route("/opinions", get(list_opinions))
        .route("/opinions/{id}/", get(get_opinion))
        .route("/opinions/{id}", get(get_opinion))
        .with_state(store)
}

/// Run `read` against a snapshot on the blocking pool.
async fn with_snapshot<T, F>(store: SharedStore, read: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn CatalogTx) -> CatalogResult<T> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || {
        let tx = store.snapshot()?;
        let value = read(tx.as_ref())?;
        tx.commit()?;
        Ok::<_, CatalogError>(value)
    })
    .await
    .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;

    Ok(outcome?)
}

/// Empty query values are treated as absent.
fn normalize(mut filter: BookFilter) -> BookFilter {
    filter.title_iexact = filter.title_iexact.filter(|value| !value.is_empty());
    filter.title_contains = filter.title_contains.filter(|value| !value.is_empty());
    filter
}

async fn list_books(
    State(store): State<SharedStore>,
    filter: Result<Query<BookFilter>, QueryRejection>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    let Query(filter) = filter.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let filter = normalize(filter);
    tracing::debug!(?filter, "listing books");

    let books = with_snapshot(store, move |tx| tx.list_books(&filter)).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

async fn list_opinions(
    State(store): State<SharedStore>,
) -> Result<Json<Vec<OpinionResponse>>, AppError> {
    let opinions = with_snapshot(store, |tx| tx.list_opinions()).await?;
    Ok(Json(opinions.into_iter().map(OpinionResponse::from).collect()))
}

async fn get_opinion(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<OpinionResponse>, AppError> {
    // Ids that cannot name a row are simply not found.
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::not_found(format!("opinion {id} not found")))?;
    let opinion = with_snapshot(store, move |tx| {
        tx.get_opinion(id)?
            .ok_or_else(|| CatalogError::not_found("opinion", id))
    })
    .await?;
    Ok(Json(opinion.into()))
}
