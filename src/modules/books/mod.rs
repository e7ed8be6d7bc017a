pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};
use tokio::sync::Mutex;

use crate::utils::{NanoIdGenerator, SystemClock};
use routes::SharedStore;
use store::BookStore;

/// Bookshelf records module: owns the in-memory store and serves `/books`.
pub struct BooksModule {
    store: SharedStore,
}

impl BooksModule {
    /// Module backed by random 16-character ids and the system clock.
    pub fn new() -> Self {
        Self::with_store(BookStore::new(
            Box::new(NanoIdGenerator::default()),
            Box::new(SystemClock),
        ))
    }

    pub fn with_store(store: BookStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Handle on the shared store.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let discarded = self.store.lock().await.len();
        tracing::info!(
            module = self.name(),
            discarded,
            "books module stopped; in-memory records dropped"
        );
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}

fn fail_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/FailResponse" }
            }
        }
    })
}

fn success_response(description: &str, data: serde_json::Value) -> serde_json::Value {
    let mut properties = serde_json::json!({
        "status": { "type": "string", "enum": ["success"] },
        "message": { "type": "string" }
    });
    if !data.is_null() {
        properties["data"] = data;
    }
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": ["status"]
                }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let id_param = serde_json::json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    });
    let payload_body = serde_json::json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookPayload" }
            }
        }
    });
    // year, author, summary and publisher are stored verbatim.
    let opaque = serde_json::json!({ "description": "Any JSON value, echoed back as sent" });
    let timestamp = serde_json::json!({
        "type": "string",
        "format": "date-time",
        "example": "2023-11-14T22:13:20.000Z"
    });
    let flag_param = |name: &str, description: &str| {
        serde_json::json!({
            "name": name,
            "in": "query",
            "required": false,
            "description": description,
            "schema": { "type": "string" }
        })
    };

    serde_json::json!({
        "paths": {
            "/books": {
                "post": {
                    "summary": "Add a book",
                    "tags": ["Books"],
                    "requestBody": payload_body.clone(),
                    "responses": {
                        "201": success_response("Book stored", serde_json::json!({
                            "type": "object",
                            "properties": { "bookId": { "type": "string" } }
                        })),
                        "400": fail_response("Missing name or readPage greater than pageCount"),
                        "500": fail_response("Book could not be stored")
                    }
                },
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": [
                        flag_param("name", "Case-insensitive substring of the book name"),
                        flag_param("reading", "1 for books being read, anything else for the rest"),
                        flag_param("finished", "1 for finished books, anything else for the rest")
                    ],
                    "responses": {
                        "200": success_response("Matching books", serde_json::json!({
                            "type": "object",
                            "properties": {
                                "books": {
                                    "type": "array",
                                    "items": { "$ref": "#/components/schemas/BookSummary" }
                                }
                            }
                        }))
                    }
                }
            },
            "/books/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "responses": {
                        "200": success_response("The book", serde_json::json!({
                            "type": "object",
                            "properties": { "book": { "$ref": "#/components/schemas/Book" } }
                        })),
                        "404": fail_response("Unknown id")
                    }
                },
                "put": {
                    "summary": "Replace a book",
                    "tags": ["Books"],
                    "parameters": [id_param.clone()],
                    "requestBody": payload_body,
                    "responses": {
                        "200": success_response("Book updated", serde_json::Value::Null),
                        "400": fail_response("Missing name or readPage greater than pageCount"),
                        "404": fail_response("Unknown id")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_param],
                    "responses": {
                        "200": success_response("Book deleted", serde_json::Value::Null),
                        "404": fail_response("Unknown id")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "16-character generated id" },
                        "name": { "type": "string" },
                        "year": opaque,
                        "author": opaque,
                        "summary": opaque,
                        "publisher": opaque,
                        "pageCount": { "type": "integer", "minimum": 0 },
                        "readPage": { "type": "integer", "minimum": 0 },
                        "finished": { "type": "boolean", "description": "readPage == pageCount" },
                        "reading": { "type": "boolean" },
                        "insertedAt": timestamp,
                        "updatedAt": timestamp
                    },
                    "required": [
                        "id", "name", "pageCount", "readPage", "finished",
                        "reading", "insertedAt", "updatedAt"
                    ]
                },
                "BookPayload": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "year": opaque,
                        "author": opaque,
                        "summary": opaque,
                        "publisher": opaque,
                        "pageCount": { "type": "integer", "minimum": 0 },
                        "readPage": { "type": "integer", "minimum": 0 },
                        "reading": { "type": "boolean" }
                    },
                    "required": ["name"]
                },
                "BookSummary": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "name": { "type": "string" },
                        "publisher": opaque
                    },
                    "required": ["id", "name"]
                }
            }
        }
    })
}
