//! Bookshelf application library
//!
//! Project modules plus the bootstrap that wires them into the HTTP host.

pub mod modules;
pub mod utils;

use anyhow::Context;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use modules::books::{
    models::{Book, BookFilter, BookPayload, BookSummary},
    store::{BookError, BookStore, ValidationError},
    BooksModule,
};

/// Registry holding every project module
pub fn registry() -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry).context("failed to register modules")?;
    Ok(registry)
}

/// Run the service until a shutdown signal arrives, then stop every module.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = registry()?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = bookshelf_http::start_server(&registry, &settings).await;

    registry.stop_modules().await?;
    served
}
