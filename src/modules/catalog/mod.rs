//! Book catalog: authors, categories, books, and their opinions.

pub mod importer;
pub mod models;
pub mod routes;
pub mod schema;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use shelf_kernel::{InitCtx, Migration, Module};

use store::CatalogStore;

/// Catalog module backed by an injected store.
pub struct CatalogModule {
    store: Arc<dyn CatalogStore>,
}

impl CatalogModule {
    pub const NAME: &'static str = "catalog";

    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "catalog module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        schema::migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalog module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    serde_json::json!({
        "paths": {
            "/books/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Catalog"],
                    "parameters": [
                        {
                            "name": "title__iexact",
                            "in": "query",
                            "required": false,
                            "description": "Case-insensitive exact title",
                            "schema": { "type": "string" }
                        },
                        {
                            "name": "title__contains",
                            "in": "query",
                            "required": false,
                            "description": "Title substring",
                            "schema": { "type": "string" }
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Books in insertion order",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "400": error_response("Malformed query string"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/opinions/": {
                "get": {
                    "summary": "List opinions",
                    "tags": ["Catalog"],
                    "responses": {
                        "200": {
                            "description": "Opinions in insertion order",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Opinion" }
                                    }
                                }
                            }
                        },
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/opinions/{id}/": {
                "get": {
                    "summary": "Fetch one opinion",
                    "tags": ["Catalog"],
                    "parameters": [
                        {
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "integer", "format": "int64" }
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "The opinion",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Opinion" }
                                }
                            }
                        },
                        "404": error_response("No opinion with this id, or an id that is not a number")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": {
                            "type": "string",
                            "description": "Author display name"
                        },
                        "isbn": { "type": "integer", "format": "int64" },
                        "category": { "type": "string" },
                        "opinions": {
                            "type": "array",
                            "description": "Opinion resource paths",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["title", "author", "isbn", "category", "opinions"]
                },
                "Opinion": {
                    "type": "object",
                    "properties": {
                        "book": {
                            "type": "string",
                            "description": "Book display string"
                        },
                        "rate": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "description": { "type": "string" }
                    },
                    "required": ["book", "rate", "description"]
                }
            }
        }
    })
}

/// Create the catalog module over `store`.
pub fn create_module(store: Arc<dyn CatalogStore>) -> Arc<dyn Module> {
    Arc::new(CatalogModule::new(store))
}
