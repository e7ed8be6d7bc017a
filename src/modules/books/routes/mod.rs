//! HTTP handlers for `/books`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::{envelope::Reply, AppError, Envelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use super::models::{Book, BookFilter, BookPayload, BookSummary, PayloadError};
use super::store::{BookError, BookStore, ValidationError};

/// The single store instance, serialised across requests.
pub type SharedStore = Arc<Mutex<BookStore>>;

const CREATED: &str = "Buku berhasil ditambahkan";
const CREATE_NAME_REQUIRED: &str = "Gagal menambahkan buku. Mohon isi nama buku";
const CREATE_READ_PAGE_TOO_LARGE: &str =
    "Gagal menambahkan buku. readPage tidak boleh lebih besar dari pageCount";
const CREATE_FAILED: &str = "Catatan gagal ditambahkan";

const NOT_FOUND: &str = "Buku tidak ditemukan";

const UPDATED: &str = "Buku berhasil diperbarui";
const UPDATE_NAME_REQUIRED: &str = "Gagal memperbarui buku. Mohon isi nama buku";
const UPDATE_READ_PAGE_TOO_LARGE: &str =
    "Gagal memperbarui buku. readPage tidak boleh lebih besar dari pageCount";
const UPDATE_NOT_FOUND: &str = "Gagal memperbarui buku. Id tidak ditemukan";

const DELETED: &str = "Buku berhasil dihapus";
const DELETE_NOT_FOUND: &str = "Buku gagal dihapus. Id tidak ditemukan";

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(store)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedBook {
    book_id: String,
}

#[derive(Debug, Serialize)]
struct BookList {
    books: Vec<BookSummary>,
}

#[derive(Debug, Serialize)]
struct BookDetail {
    book: Book,
}

/// Raw list query; flags are `"1"` for true, anything else for false.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    name: Option<String>,
    reading: Option<String>,
    finished: Option<String>,
}

impl From<ListQuery> for BookFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            name: query.name,
            reading: query.reading.as_deref().map(BookFilter::flag),
            finished: query.finished.as_deref().map(BookFilter::flag),
        }
    }
}

/// Messages one write operation reports its failures with.
struct WriteMessages {
    name_required: &'static str,
    too_many_pages: &'static str,
    missing: &'static str,
}

const CREATE_MESSAGES: WriteMessages = WriteMessages {
    name_required: CREATE_NAME_REQUIRED,
    too_many_pages: CREATE_READ_PAGE_TOO_LARGE,
    missing: NOT_FOUND,
};

const UPDATE_MESSAGES: WriteMessages = WriteMessages {
    name_required: UPDATE_NAME_REQUIRED,
    too_many_pages: UPDATE_READ_PAGE_TOO_LARGE,
    missing: UPDATE_NOT_FOUND,
};

impl WriteMessages {
    /// Map a store error onto this operation's messages.
    fn store_error(&self, err: BookError) -> AppError {
        match err {
            BookError::Validation(invalid) => self.invalid(invalid),
            BookError::NotFound(_) => AppError::not_found(self.missing),
            BookError::Internal(reason) => {
                AppError::Internal(anyhow::anyhow!(reason).context(CREATE_FAILED))
            }
        }
    }

    fn payload_error(&self, err: PayloadError) -> AppError {
        match err {
            PayloadError::Invalid(invalid) => self.invalid(invalid),
            PayloadError::Malformed(err) => AppError::bad_request(err.to_string()),
        }
    }

    fn invalid(&self, err: ValidationError) -> AppError {
        match err {
            ValidationError::NameRequired => AppError::validation(self.name_required),
            ValidationError::ReadPageExceedsPageCount => {
                AppError::validation(self.too_many_pages)
            }
        }
    }
}

/// Extract the body as loose JSON so the name can be checked before the
/// typed fields are decoded.
fn decode_payload(
    body: Result<Json<Value>, JsonRejection>,
    messages: &WriteMessages,
) -> Result<BookPayload, AppError> {
    let Json(body) = body?;
    BookPayload::from_json(body).map_err(|err| messages.payload_error(err))
}

async fn create_book(
    State(store): State<SharedStore>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Reply<CreatedBook>, AppError> {
    let payload = decode_payload(body, &CREATE_MESSAGES)?;

    let book_id = store
        .lock()
        .await
        .create(payload)
        .map_err(|err| CREATE_MESSAGES.store_error(err))?;

    tracing::info!(book_id = %book_id, "book created");
    Ok(Envelope::success(CreatedBook { book_id })
        .with_message(CREATED)
        .with_status(StatusCode::CREATED))
}

async fn list_books(
    State(store): State<SharedStore>,
    query: Result<Query<ListQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Envelope<BookList>, AppError> {
    let Query(query) = query?;
    let filter = BookFilter::from(query);

    let books = store.lock().await.list(&filter);
    Ok(Envelope::success(BookList { books }))
}

async fn get_book(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Envelope<BookDetail>, AppError> {
    let book = store
        .lock()
        .await
        .get(&id)
        .map_err(|_| AppError::not_found(NOT_FOUND))?;

    Ok(Envelope::success(BookDetail { book }))
}

async fn update_book(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Envelope, AppError> {
    let payload = decode_payload(body, &UPDATE_MESSAGES)?;

    store
        .lock()
        .await
        .update(&id, payload)
        .map_err(|err| UPDATE_MESSAGES.store_error(err))?;

    tracing::info!(book_id = %id, "book updated");
    Ok(Envelope::acknowledged(UPDATED))
}

async fn delete_book(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Envelope, AppError> {
    store
        .lock()
        .await
        .delete(&id)
        .map_err(|_| AppError::not_found(DELETE_NOT_FOUND))?;

    tracing::info!(book_id = %id, "book deleted");
    Ok(Envelope::acknowledged(DELETED))
}
