//! SQLite-backed catalog store

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension, Row};
use shelf_db::{Database, Tx};

use super::models::{
    Author, Book, BookEntry, BookFilter, Category, Isbn, InvalidIsbn, NewAuthor, NewBook,
    NewOpinion, Opinion, OpinionEntry,
};
use super::store::{CatalogError, CatalogResult, CatalogStore, CatalogTx};

const BOOK_COLUMNS: &str = "b.id, b.title, b.isbn, b.author_id, b.category_id";
const AUTHOR_COLUMNS: &str = "a.id, a.first_name, a.second_name, a.last_name";
/// Book title predicates; `?1` is the case-insensitive exact title, `?2` the substring.
const TITLE_FILTER: &str =
    "(?1 IS NULL OR casefold(b.title) = casefold(?1)) AND (?2 IS NULL OR instr(b.title, ?2) > 0)";

/// Catalog store over a shared [`Database`]
pub struct SqliteCatalog {
    db: Arc<Database>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl CatalogStore for SqliteCatalog {
    fn begin(&self) -> CatalogResult<Box<dyn CatalogTx + '_>> {
        Ok(Box::new(SqliteCatalogTx {
            tx: self.db.write()?,
        }))
    }

    fn snapshot(&self) -> CatalogResult<Box<dyn CatalogTx + '_>> {
        Ok(Box::new(SqliteCatalogTx {
            tx: self.db.read()?,
        }))
    }
}

struct SqliteCatalogTx<'a> {
    tx: Tx<'a>,
}

impl SqliteCatalogTx<'_> {
    fn conn(&self) -> &rusqlite::Connection {
        self.tx.conn()
    }

    /// Opinion ids of every book passing `filter`, keyed by book id.
    fn opinion_ids(&self, filter: &BookFilter) -> CatalogResult<HashMap<i64, Vec<i64>>> {
        let sql = format!(
            "SELECT o.book_id, o.id
             FROM opinion o JOIN book b ON b.id = o.book_id
             WHERE {TITLE_FILTER}
             ORDER BY o.id"
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let mut rows = stmt.query(params![filter.title_iexact, filter.title_contains])?;

        let mut by_book: HashMap<i64, Vec<i64>> = HashMap::new();
        while let Some(row) = rows.next()? {
            by_book.entry(row.get(0)?).or_default().push(row.get(1)?);
        }
        Ok(by_book)
    }

    fn delete(&self, table: &'static str, id: i64) -> CatalogResult<()> {
        let removed = self
            .conn()
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        if removed == 0 {
            return Err(CatalogError::not_found(table, id));
        }
        tracing::debug!(table, id, "row deleted");
        Ok(())
    }
}

impl CatalogTx for SqliteCatalogTx<'_> {
    fn find_author(&self, first_name: &str, last_name: &str) -> CatalogResult<Option<Author>> {
        let sql = format!(
            "SELECT {AUTHOR_COLUMNS} FROM author a WHERE a.first_name = ?1 AND a.last_name = ?2"
        );
        self.conn()
            .query_row(&sql, params![first_name, last_name], |row| {
                row_to_author(row, 0)
            })
            .optional()
            .map_err(Into::into)
    }

    fn create_author(&self, author: &NewAuthor) -> CatalogResult<Author> {
        self.conn().execute(
            "INSERT INTO author (first_name, second_name, last_name) VALUES (?1, ?2, ?3)",
            params![author.first_name, author.second_name, author.last_name],
        )?;
        Ok(Author {
            id: self.conn().last_insert_rowid(),
            first_name: author.first_name.clone(),
            second_name: author.second_name.clone(),
            last_name: author.last_name.clone(),
        })
    }

    fn delete_author(&self, id: i64) -> CatalogResult<()> {
        self.delete("author", id)
    }

    fn find_category(&self, name: &str) -> CatalogResult<Option<Category>> {
        self.conn()
            .query_row(
                "SELECT id, name FROM category WHERE name = ?1",
                [name],
                |row| row_to_category(row, 0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn create_category(&self, name: &str) -> CatalogResult<Category> {
        self.conn()
            .execute("INSERT INTO category (name) VALUES (?1)", [name])?;
        Ok(Category {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn delete_category(&self, id: i64) -> CatalogResult<()> {
        self.delete("category", id)
    }

    fn find_book(&self, book: &NewBook) -> CatalogResult<Option<Book>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM book b
             WHERE b.title = ?1 AND b.isbn = ?2 AND b.author_id = ?3 AND b.category_id = ?4"
        );
        self.conn()
            .query_row(
                &sql,
                params![
                    book.title,
                    isbn_to_sql(book.isbn),
                    book.author_id,
                    book.category_id
                ],
                |row| row_to_book(row, 0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn find_book_by_isbn(&self, isbn: Isbn) -> CatalogResult<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM book b WHERE b.isbn = ?1");
        self.conn()
            .query_row(&sql, [isbn_to_sql(isbn)], |row| row_to_book(row, 0))
            .optional()
            .map_err(Into::into)
    }

    fn create_book(&self, book: &NewBook) -> CatalogResult<Book> {
        self.conn().execute(
            "INSERT INTO book (title, isbn, author_id, category_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                book.title,
                isbn_to_sql(book.isbn),
                book.author_id,
                book.category_id
            ],
        )?;
        Ok(Book {
            id: self.conn().last_insert_rowid(),
            title: book.title.clone(),
            isbn: book.isbn,
            author_id: book.author_id,
            category_id: book.category_id,
        })
    }

    fn delete_book(&self, id: i64) -> CatalogResult<()> {
        self.delete("book", id)
    }

    fn find_opinion(&self, opinion: &NewOpinion) -> CatalogResult<Option<Opinion>> {
        self.conn()
            .query_row(
                "SELECT id, rate, description, book_id FROM opinion
                 WHERE rate = ?1 AND description = ?2 AND book_id = ?3",
                params![opinion.rate, opinion.description, opinion.book_id],
                |row| row_to_opinion(row, 0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn create_opinion(&self, opinion: &NewOpinion) -> CatalogResult<Opinion> {
        self.conn().execute(
            "INSERT INTO opinion (rate, description, book_id) VALUES (?1, ?2, ?3)",
            params![opinion.rate, opinion.description, opinion.book_id],
        )?;
        Ok(Opinion {
            id: self.conn().last_insert_rowid(),
            rate: opinion.rate,
            description: opinion.description.clone(),
            book_id: opinion.book_id,
        })
    }

    fn list_books(&self, filter: &BookFilter) -> CatalogResult<Vec<BookEntry>> {
        let sql = format!(
            "SELECT {BOOK_COLUMNS}, {AUTHOR_COLUMNS}, c.id, c.name
             FROM book b
             JOIN author a ON a.id = b.author_id
             JOIN category c ON c.id = b.category_id
             WHERE {TITLE_FILTER}
             ORDER BY b.id"
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let rows = stmt
            .query_map(
                params![filter.title_iexact, filter.title_contains],
                |row| {
                    Ok((
                        row_to_book(row, 0)?,
                        row_to_author(row, 5)?,
                        row_to_category(row, 9)?,
                    ))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut opinion_ids = self.opinion_ids(filter)?;
        Ok(rows
            .into_iter()
            .map(|(book, author, category)| BookEntry {
                opinion_ids: opinion_ids.remove(&book.id).unwrap_or_default(),
                book,
                author,
                category,
            })
            .collect())
    }

    fn list_opinions(&self) -> CatalogResult<Vec<OpinionEntry>> {
        let sql = format!(
            "SELECT o.id, o.rate, o.description, o.book_id, {BOOK_COLUMNS}
             FROM opinion o JOIN book b ON b.id = o.book_id
             ORDER BY o.id"
        );
        let mut stmt = self.conn().prepare_cached(&sql)?;
        let entries = stmt
            .query_map([], row_to_opinion_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_opinion(&self, id: i64) -> CatalogResult<Option<OpinionEntry>> {
        let sql = format!(
            "SELECT o.id, o.rate, o.description, o.book_id, {BOOK_COLUMNS}
             FROM opinion o JOIN book b ON b.id = o.book_id
             WHERE o.id = ?1"
        );
        self.conn()
            .query_row(&sql, [id], row_to_opinion_entry)
            .optional()
            .map_err(Into::into)
    }

    fn commit(self: Box<Self>) -> CatalogResult<()> {
        let this = *self;
        this.tx.commit()?;
        Ok(())
    }
}

fn isbn_to_sql(isbn: Isbn) -> i64 {
    // Isbn::MAX is far below i64::MAX
    isbn.get() as i64
}

fn row_to_author(row: &Row, offset: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(offset)?,
        first_name: row.get(offset + 1)?,
        second_name: row.get(offset + 2)?,
        last_name: row.get(offset + 3)?,
    })
}

fn row_to_category(row: &Row, offset: usize) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
    })
}

fn row_to_book(row: &Row, offset: usize) -> rusqlite::Result<Book> {
    let raw_isbn: i64 = row.get(offset + 2)?;
    let isbn = u64::try_from(raw_isbn)
        .ok()
        .and_then(Isbn::new)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                offset + 2,
                rusqlite::types::Type::Integer,
                Box::new(InvalidIsbn(raw_isbn.to_string())),
            )
        })?;

    Ok(Book {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        isbn,
        author_id: row.get(offset + 3)?,
        category_id: row.get(offset + 4)?,
    })
}

fn row_to_opinion(row: &Row, offset: usize) -> rusqlite::Result<Opinion> {
    Ok(Opinion {
        id: row.get(offset)?,
        rate: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        book_id: row.get(offset + 3)?,
    })
}

fn row_to_opinion_entry(row: &Row) -> rusqlite::Result<OpinionEntry> {
    Ok(OpinionEntry {
        opinion: row_to_opinion(row, 0)?,
        book: row_to_book(row, 4)?,
    })
}
