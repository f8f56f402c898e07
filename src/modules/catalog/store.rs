//! Store contract for the catalog.
//!
//! Everything goes through a transaction handle: [`CatalogStore::begin`] for
//! writes and [`CatalogStore::snapshot`] for reads. A handle dropped without
//! [`CatalogTx::commit`] is rolled back.

use shelf_db::{ConstraintKind, DbError};
use thiserror::Error;

use super::models::{
    Author, Book, BookEntry, BookFilter, Category, Isbn, NewAuthor, NewBook, NewOpinion, Opinion,
    OpinionEntry,
};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error(transparent)]
    Store(#[from] DbError),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Constraint kind, when a write was rejected by the store.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            CatalogError::Store(err) => err.constraint_kind(),
            CatalogError::NotFound { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Store(err.into())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Injected handle to the catalog's backing store.
pub trait CatalogStore: Send + Sync {
    /// Open a write transaction.
    fn begin(&self) -> CatalogResult<Box<dyn CatalogTx + '_>>;

    /// Open a read-only view.
    fn snapshot(&self) -> CatalogResult<Box<dyn CatalogTx + '_>>;
}

/// Operations available inside one transaction.
///
/// Lookups match keys exactly. Creates never merge with existing rows; any
/// uniqueness, range or reference violation is returned as an error.
pub trait CatalogTx {
    fn find_author(&self, first_name: &str, last_name: &str) -> CatalogResult<Option<Author>>;
    fn create_author(&self, author: &NewAuthor) -> CatalogResult<Author>;
    /// Rejected while any book references the author.
    fn delete_author(&self, id: i64) -> CatalogResult<()>;

    fn find_category(&self, name: &str) -> CatalogResult<Option<Category>>;
    fn create_category(&self, name: &str) -> CatalogResult<Category>;
    /// Rejected while any book references the category.
    fn delete_category(&self, id: i64) -> CatalogResult<()>;

    /// Book matching every field of `book`.
    fn find_book(&self, book: &NewBook) -> CatalogResult<Option<Book>>;
    fn find_book_by_isbn(&self, isbn: Isbn) -> CatalogResult<Option<Book>>;
    fn create_book(&self, book: &NewBook) -> CatalogResult<Book>;
    /// Deletes the book's opinions with it.
    fn delete_book(&self, id: i64) -> CatalogResult<()>;

    /// Opinion matching every field of `opinion`.
    fn find_opinion(&self, opinion: &NewOpinion) -> CatalogResult<Option<Opinion>>;
    fn create_opinion(&self, opinion: &NewOpinion) -> CatalogResult<Opinion>;

    /// Books in primary-key order.
    fn list_books(&self, filter: &BookFilter) -> CatalogResult<Vec<BookEntry>>;
    /// Opinions in primary-key order.
    fn list_opinions(&self) -> CatalogResult<Vec<OpinionEntry>>;
    fn get_opinion(&self, id: i64) -> CatalogResult<Option<OpinionEntry>>;

    fn commit(self: Box<Self>) -> CatalogResult<()>;
}
