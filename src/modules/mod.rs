pub mod catalog;

use std::sync::Arc;

use shelf_kernel::ModuleRegistry;

use catalog::store::CatalogStore;

/// Register all project modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    catalog: Arc<dyn CatalogStore>,
) -> anyhow::Result<()> {
    registry.register(catalog::create_module(catalog))?;
    Ok(())
}
