//! In-memory book collection.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::models::{Book, BookFilter, BookPayload, BookSummary};
use crate::utils::{Clock, IdGenerator};

/// Fresh ids are drawn at most this many times before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Payload constraint violations, detected before any mutation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name required")]
    NameRequired,
    #[error("readPage exceeds pageCount")]
    ReadPageExceedsPageCount,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("book '{0}' not found")]
    NotFound(String),
    #[error("internal store error: {0}")]
    Internal(&'static str),
}

/// Ordered collection of books. Insertion order is preserved and ids are
/// never handed out twice, even after the owning book is deleted.
pub struct BookStore {
    books: Vec<Book>,
    issued: HashSet<String>,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
}

impl BookStore {
    pub fn new(ids: Box<dyn IdGenerator>, clock: Box<dyn Clock>) -> Self {
        Self {
            books: Vec::new(),
            issued: HashSet::new(),
            ids,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Validate and append a new book, returning its id.
    #[instrument(skip(self, payload))]
    pub fn create(&mut self, payload: BookPayload) -> Result<String, BookError> {
        let name = validate(&payload)?;
        let id = self.fresh_id()?;
        let now = self.clock.now();

        let book = Book {
            id: id.clone(),
            name,
            year: payload.year,
            author: payload.author,
            summary: payload.summary,
            publisher: payload.publisher,
            page_count: payload.page_count,
            read_page: payload.read_page,
            finished: payload.read_page == payload.page_count,
            reading: payload.reading,
            inserted_at: now,
            updated_at: now,
        };
        self.books.push(book);

        if self.position(&id).is_none() {
            return Err(BookError::Internal("appended book is not retrievable"));
        }

        debug!(book_id = %id, total = self.books.len(), "book stored");
        Ok(id)
    }

    /// Project every book matching `filter`, in insertion order.
    pub fn list(&self, filter: &BookFilter) -> Vec<BookSummary> {
        let needle = filter
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase);

        self.books
            .iter()
            .filter(|book| {
                needle
                    .as_deref()
                    .is_none_or(|needle| book.name.to_lowercase().contains(needle))
            })
            .filter(|book| filter.reading.is_none_or(|reading| book.reading == reading))
            .filter(|book| filter.finished.is_none_or(|finished| book.finished == finished))
            .map(BookSummary::from)
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Book, BookError> {
        self.books
            .iter()
            .find(|book| book.id == id)
            .cloned()
            .ok_or_else(|| BookError::NotFound(id.to_string()))
    }

    /// Replace every field except `id` and `insertedAt`. The payload is
    /// validated before the id is looked up.
    #[instrument(skip(self, payload))]
    pub fn update(&mut self, id: &str, payload: BookPayload) -> Result<(), BookError> {
        let name = validate(&payload)?;
        let index = self
            .position(id)
            .ok_or_else(|| BookError::NotFound(id.to_string()))?;
        let now = self.clock.now();

        self.books[index].apply(payload, name, now);

        debug!(book_id = %id, "book updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<(), BookError> {
        let index = self
            .position(id)
            .ok_or_else(|| BookError::NotFound(id.to_string()))?;
        self.books.remove(index);

        debug!(book_id = %id, total = self.books.len(), "book deleted");
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.books.iter().position(|book| book.id == id)
    }

    fn fresh_id(&mut self) -> Result<String, BookError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.generate();
            if self.issued.insert(id.clone()) {
                return Ok(id);
            }
            warn!(book_id = %id, "generated id collides with an issued one; retrying");
        }
        Err(BookError::Internal("unable to generate a unique id"))
    }
}

/// Returns the name to store.
fn validate(payload: &BookPayload) -> Result<String, ValidationError> {
    let name = match payload.name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => return Err(ValidationError::NameRequired),
    };
    if payload.read_page > payload.page_count {
        return Err(ValidationError::ReadPageExceedsPageCount);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use time::{Duration, OffsetDateTime};

    /// Hands out `book-0`, `book-1`, ... or replays a fixed script.
    struct ScriptedIds {
        script: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl ScriptedIds {
        fn sequential() -> Self {
            Self {
                script: Vec::new(),
                next: AtomicUsize::new(0),
            }
        }

        fn replay(script: Vec<&'static str>) -> Self {
            Self {
                script,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl IdGenerator for ScriptedIds {
        fn generate(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            if self.script.is_empty() {
                format!("book-{n}")
            } else {
                self.script[n % self.script.len()].to_string()
            }
        }
    }

    /// Advances one second on every reading.
    #[derive(Clone)]
    struct TickingClock {
        seconds: Arc<AtomicI64>,
    }

    impl TickingClock {
        fn new() -> Self {
            Self {
                seconds: Arc::new(AtomicI64::new(1_700_000_000)),
            }
        }
    }

    impl Clock for TickingClock {
        fn now(&self) -> OffsetDateTime {
            let secs = self.seconds.fetch_add(1, Ordering::SeqCst);
            OffsetDateTime::from_unix_timestamp(secs).unwrap()
        }
    }

    fn store() -> BookStore {
        BookStore::new(
            Box::new(ScriptedIds::sequential()),
            Box::new(TickingClock::new()),
        )
    }

    fn payload(name: &str, page_count: u32, read_page: u32, reading: bool) -> BookPayload {
        BookPayload {
            name: Some(name.to_string()),
            year: Some(json!(1965)),
            author: Some(json!("Frank Herbert")),
            summary: Some(json!("Spice")),
            publisher: Some(json!("Chilton")),
            page_count,
            read_page,
            reading,
        }
    }

    #[test]
    fn create_derives_finished_and_stamps_both_timestamps() {
        let mut store = store();
        let id = store.create(payload("Dune", 500, 500, false)).unwrap();

        let book = store.get(&id).unwrap();
        assert!(book.finished);
        assert!(!book.reading);
        assert_eq!(book.inserted_at, book.updated_at);
        assert_eq!(book.year, Some(json!(1965)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_rejects_missing_or_blank_name() {
        let mut store = store();
        for name in [None, Some(""), Some("   "), Some("\t\n")] {
            let mut body = payload("x", 10, 20, false);
            body.name = name.map(str::to_string);
            // Name is checked before the page counts.
            assert_eq!(
                store.create(body),
                Err(BookError::Validation(ValidationError::NameRequired))
            );
        }
        assert!(store.is_empty());
    }

    #[test]
    fn create_rejects_read_page_past_page_count() {
        let mut store = store();
        assert_eq!(
            store.create(payload("X", 10, 20, false)),
            Err(BookError::Validation(
                ValidationError::ReadPageExceedsPageCount
            ))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn create_keeps_the_name_untrimmed() {
        let mut store = store();
        let id = store.create(payload("  Dune ", 10, 0, false)).unwrap();
        assert_eq!(store.get(&id).unwrap().name, "  Dune ");
    }

    #[test]
    fn list_without_filters_projects_in_insertion_order() {
        let mut store = store();
        let a = store.create(payload("Dune", 500, 10, true)).unwrap();
        let b = store.create(payload("Emma", 300, 300, false)).unwrap();
        let c = store.create(payload("Ulysses", 700, 0, false)).unwrap();

        let listed = store.list(&BookFilter::default());
        let ids: Vec<_> = listed.iter().map(|summary| summary.id.clone()).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(listed[0].name, "Dune");
        assert_eq!(listed[0].publisher, Some(json!("Chilton")));
    }

    #[test]
    fn list_filters_combine_with_and() {
        let mut store = store();
        store.create(payload("Dune", 500, 10, true)).unwrap();
        store.create(payload("Dune Messiah", 300, 300, true)).unwrap();
        store.create(payload("Children of Dune", 400, 400, false)).unwrap();
        store.create(payload("Emma", 300, 0, false)).unwrap();

        let names = |filter: BookFilter| -> Vec<String> {
            store.list(&filter).into_iter().map(|b| b.name).collect()
        };

        assert_eq!(
            names(BookFilter {
                name: Some("dUnE".into()),
                ..Default::default()
            }),
            vec!["Dune", "Dune Messiah", "Children of Dune"]
        );
        assert_eq!(
            names(BookFilter {
                reading: Some(true),
                ..Default::default()
            }),
            vec!["Dune", "Dune Messiah"]
        );
        assert_eq!(
            names(BookFilter {
                finished: Some(false),
                ..Default::default()
            }),
            vec!["Dune", "Emma"]
        );
        assert_eq!(
            names(BookFilter {
                name: Some("dune".into()),
                reading: Some(false),
                finished: Some(true),
            }),
            vec!["Children of Dune"]
        );
        assert_eq!(
            names(BookFilter {
                name: Some(String::new()),
                ..Default::default()
            })
            .len(),
            4
        );
        assert!(names(BookFilter {
            name: Some("tolkien".into()),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = store();
        assert_eq!(
            store.get("missing"),
            Err(BookError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn update_replaces_fields_and_refreshes_updated_at() {
        let mut store = store();
        let id = store.create(payload("Dune", 500, 10, true)).unwrap();
        let before = store.get(&id).unwrap();

        let mut body = payload("Dune (revised)", 520, 520, false);
        body.author = None;
        store.update(&id, body).unwrap();

        let after = store.get(&id).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.name, "Dune (revised)");
        assert_eq!(after.author, None);
        assert_eq!(after.page_count, 520);
        assert!(after.finished);
        assert!(!after.reading);
        assert_eq!(after.inserted_at, before.inserted_at);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.updated_at - before.updated_at, Duration::seconds(1));
    }

    #[test]
    fn update_recomputes_finished_both_ways() {
        let mut store = store();
        let id = store.create(payload("Dune", 500, 500, false)).unwrap();
        assert!(store.get(&id).unwrap().finished);

        store.update(&id, payload("Dune", 600, 500, true)).unwrap();
        assert!(!store.get(&id).unwrap().finished);

        store.update(&id, payload("Dune", 600, 600, true)).unwrap();
        assert!(store.get(&id).unwrap().finished);
    }

    #[test]
    fn update_validates_before_looking_up_the_id() {
        let mut store = store();
        let mut blank = payload("x", 1, 0, false);
        blank.name = Some(" ".into());

        assert_eq!(
            store.update("missing", blank),
            Err(BookError::Validation(ValidationError::NameRequired))
        );
        assert_eq!(
            store.update("missing", payload("X", 10, 20, false)),
            Err(BookError::Validation(
                ValidationError::ReadPageExceedsPageCount
            ))
        );
        assert_eq!(
            store.update("missing", payload("X", 10, 5, false)),
            Err(BookError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn rejected_update_leaves_the_book_untouched() {
        let mut store = store();
        let id = store.create(payload("Dune", 500, 10, true)).unwrap();
        let before = store.get(&id).unwrap();

        assert!(store.update(&id, payload("Dune", 5, 10, true)).is_err());
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let mut store = store();
        let keep = store.create(payload("Emma", 300, 0, false)).unwrap();
        let id = store.create(payload("Dune", 500, 10, true)).unwrap();

        store.delete(&id).unwrap();
        assert_eq!(store.get(&id), Err(BookError::NotFound(id.clone())));
        assert_eq!(store.delete(&id), Err(BookError::NotFound(id)));
        assert!(store.get(&keep).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ids_are_never_reissued() {
        let mut store = BookStore::new(
            Box::new(ScriptedIds::replay(vec!["aaaa", "aaaa", "bbbb"])),
            Box::new(TickingClock::new()),
        );
        let first = store.create(payload("One", 1, 0, false)).unwrap();
        store.delete(&first).unwrap();

        let second = store.create(payload("Two", 1, 0, false)).unwrap();
        assert_eq!(first, "aaaa");
        assert_eq!(second, "bbbb");
    }

    #[test]
    fn exhausted_id_space_is_an_internal_error() {
        let mut store = BookStore::new(
            Box::new(ScriptedIds::replay(vec!["same"])),
            Box::new(TickingClock::new()),
        );
        store.create(payload("One", 1, 0, false)).unwrap();

        assert_eq!(
            store.create(payload("Two", 1, 0, false)),
            Err(BookError::Internal("unable to generate a unique id"))
        );
        assert_eq!(store.len(), 1);
    }
}
