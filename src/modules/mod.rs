pub mod books;

use bookshelf_kernel::ModuleRegistry;

/// Register all project modules with the registry
pub fn register_all(registry: &mut ModuleRegistry) -> anyhow::Result<()> {
    registry.register(books::create_module())?;
    Ok(())
}
