//! Module contract.
//!
//! A module owns a slice of the service: its tables (as migrations), its HTTP
//! routes, and the OpenAPI paths describing them. The application opens the
//! database, applies every module's migrations, then runs `init` and `start`
//! before the listener accepts requests, and `stop` after it drains.

use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// Read-only view of the loaded configuration handed to lifecycle hooks.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

/// One schema step owned by a module, identified by `(module name, id)`.
///
/// `up` may hold several statements and is applied as one batch inside a
/// single transaction; ids sort lexically, so prefix them with a sequence.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

#[async_trait]
pub trait Module: Sync + Send {
    /// Registry key; also the `module` column in `schema_migrations`.
    fn name(&self) -> &'static str;

    /// Runs once migrations are applied and before `start`.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes with their full paths; merged into the root router unprefixed.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// `{"paths": .., "components": {"schemas": ..}}` fragment merged into
    /// `/docs/openapi.json`.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Last hook before the server binds.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after shutdown, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
