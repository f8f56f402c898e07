//! Shelf application library.
//!
//! Wires the catalog module, its SQLite store, and the HTTP server together.
//! Both binaries (`shelf-app` and the `shelf` CLI) go through [`App`].

pub mod modules;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use modules::catalog::importer::{ImportError, ImportReport, Importer};
use modules::catalog::sqlite::SqliteCatalog;
use modules::catalog::store::CatalogStore;

/// Re-export commonly used types
pub use modules::catalog;

/// A configured application: settings, open database, registered modules.
pub struct App {
    settings: Settings,
    db: Arc<Database>,
    catalog: Arc<dyn CatalogStore>,
    registry: ModuleRegistry,
}

impl App {
    /// Open the configured database and register all modules.
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        let db = Arc::new(
            Database::connect(&settings.database)
                .with_context(|| format!("failed to open database '{}'", settings.database.path))?,
        );
        let catalog: Arc<dyn CatalogStore> = Arc::new(SqliteCatalog::new(db.clone()));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, catalog.clone())?;

        tracing::info!(
            env = ?settings.environment,
            db = %db.path(),
            modules = registry.len(),
            "application opened"
        );

        Ok(Self {
            settings,
            db,
            catalog,
            registry,
        })
    }

    /// Apply pending migrations; returns how many ran.
    pub fn migrate(&self) -> anyhow::Result<usize> {
        let migrations = self.registry.collect_migrations();
        let applied = self
            .db
            .apply_migrations(&migrations)
            .context("failed to apply migrations")?;
        tracing::info!(applied, total = migrations.len(), "migrations complete");
        Ok(applied)
    }

    /// `module/id` of every applied migration, oldest first.
    pub fn applied_migrations(&self) -> anyhow::Result<Vec<String>> {
        let applied = self
            .db
            .applied_migrations()
            .context("failed to read applied migrations")?;
        Ok(applied
            .into_iter()
            .map(|(module, id)| format!("{module}/{id}"))
            .collect())
    }

    /// Import one file, dispatching on its name. Unknown names return `None`.
    pub fn import(&self, path: &Path) -> Result<Option<ImportReport>, ImportError> {
        Importer::new(self.catalog.as_ref(), &self.settings.import).import_path(path)
    }

    /// The full HTTP router, middleware included.
    pub fn router(&self) -> Router {
        shelf_http::build_router(&self.registry, &self.settings)
    }

    /// Migrate, run module lifecycle hooks, and serve until Ctrl-C.
    pub async fn serve(&self) -> anyhow::Result<()> {
        self.migrate()?;

        let ctx = InitCtx {
            settings: &self.settings,
        };
        self.registry.init_all(&ctx).await?;
        self.registry.start_all(&ctx).await?;

        let served = shelf_http::start_server(&self.registry, &self.settings).await;

        self.registry.stop_all().await?;
        served
    }
}
