//! Delimited-file importer for books and opinions.
//!
//! The file name selects the format. Every row is resolved and inserted in
//! its own write transaction; the first failing row ends the run, leaving
//! earlier rows committed.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use shelf_kernel::settings::ImportSettings;
use thiserror::Error;

use super::models::{Isbn, NewAuthor, NewBook, NewOpinion};
use super::store::{CatalogError, CatalogStore};

const BOOK_FIELDS: usize = 4;
const OPINION_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Books,
    Opinions,
}

impl ImportKind {
    fn noun(self) -> &'static str {
        match self {
            ImportKind::Books => "books",
            ImportKind::Opinions => "opinions",
        }
    }
}

/// Outcome of one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub kind: ImportKind,
    /// Data rows read, header excluded.
    pub rows: usize,
    /// Rows that produced a new record.
    pub created: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created > 0 {
            write!(
                f,
                "Successfully imported {} {}!",
                self.created,
                self.kind.noun()
            )
        } else {
            write!(f, "No new {} to import.", self.kind.noun())
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("import delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("{}:{line}: book with ISBN {isbn} does not exist", path.display())]
    MissingBook { path: PathBuf, line: u64, isbn: Isbn },

    #[error("{}:{line}: {source}", path.display())]
    Catalog {
        path: PathBuf,
        line: u64,
        #[source]
        source: CatalogError,
    },
}

/// Why a single row failed, before it is tied to a file position.
enum RowError {
    Malformed(String),
    MissingBook(Isbn),
    Catalog(CatalogError),
}

impl From<CatalogError> for RowError {
    fn from(err: CatalogError) -> Self {
        RowError::Catalog(err)
    }
}

impl RowError {
    fn at(self, path: &Path, line: u64) -> ImportError {
        let path = path.to_path_buf();
        match self {
            RowError::Malformed(reason) => ImportError::MalformedRow { path, line, reason },
            RowError::MissingBook(isbn) => ImportError::MissingBook { path, line, isbn },
            RowError::Catalog(source) => ImportError::Catalog { path, line, source },
        }
    }
}

/// `isbn;title;author;category`
struct BookRow {
    isbn: Isbn,
    title: String,
    author: NewAuthor,
    category: String,
}

impl BookRow {
    fn parse(record: &csv::StringRecord) -> Result<Self, RowError> {
        expect_fields(record, BOOK_FIELDS)?;
        let author = NewAuthor::parse(&record[2])
            .ok_or_else(|| RowError::Malformed("author name is empty".to_string()))?;
        Ok(Self {
            isbn: parse_isbn(&record[0])?,
            title: record[1].to_string(),
            author,
            category: record[3].to_string(),
        })
    }
}

/// `isbn;rate;description`
struct OpinionRow {
    isbn: Isbn,
    rate: u8,
    description: String,
}

impl OpinionRow {
    fn parse(record: &csv::StringRecord) -> Result<Self, RowError> {
        expect_fields(record, OPINION_FIELDS)?;
        let rate = record[1]
            .trim()
            .parse::<u8>()
            .map_err(|_| RowError::Malformed(format!("rate '{}' is not a number", &record[1])))?;
        Ok(Self {
            isbn: parse_isbn(&record[0])?,
            rate,
            description: record[2].to_string(),
        })
    }
}

fn expect_fields(record: &csv::StringRecord, expected: usize) -> Result<(), RowError> {
    if record.len() != expected {
        return Err(RowError::Malformed(format!(
            "expected {expected} fields, found {}",
            record.len()
        )));
    }
    Ok(())
}

fn parse_isbn(raw: &str) -> Result<Isbn, RowError> {
    raw.parse()
        .map_err(|err: super::models::InvalidIsbn| RowError::Malformed(err.to_string()))
}

/// Loads import files into a [`CatalogStore`].
pub struct Importer<'a> {
    store: &'a dyn CatalogStore,
    settings: &'a ImportSettings,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a dyn CatalogStore, settings: &'a ImportSettings) -> Self {
        Self { store, settings }
    }

    /// Import format selected by the file's base name, if any.
    pub fn kind_for(&self, path: &Path) -> Option<ImportKind> {
        let name = path.file_name()?.to_str()?;
        if name == self.settings.books_file {
            Some(ImportKind::Books)
        } else if name == self.settings.opinions_file {
            Some(ImportKind::Opinions)
        } else {
            None
        }
    }

    /// Import `path` if its name is one of the known files; otherwise do nothing.
    pub fn import_path(&self, path: &Path) -> Result<Option<ImportReport>, ImportError> {
        match self.kind_for(path) {
            Some(ImportKind::Books) => self.import_books(path).map(Some),
            Some(ImportKind::Opinions) => self.import_opinions(path).map(Some),
            None => {
                tracing::debug!(path = %path.display(), "not an import file, skipping");
                Ok(None)
            }
        }
    }

    pub fn import_books(&self, path: &Path) -> Result<ImportReport, ImportError> {
        self.run(path, ImportKind::Books, |record| {
            let row = BookRow::parse(record)?;
            self.upsert_book(&row)
        })
    }

    pub fn import_opinions(&self, path: &Path) -> Result<ImportReport, ImportError> {
        self.run(path, ImportKind::Opinions, |record| {
            let row = OpinionRow::parse(record)?;
            self.upsert_opinion(&row)
        })
    }

    fn run<F>(&self, path: &Path, kind: ImportKind, mut import_row: F) -> Result<ImportReport, ImportError>
    where
        F: FnMut(&csv::StringRecord) -> Result<bool, RowError>,
    {
        tracing::info!(path = %path.display(), kind = kind.noun(), "import started");

        let mut reader = self.reader(path)?;
        let mut report = ImportReport {
            kind,
            rows: 0,
            created: 0,
        };

        for record in reader.records() {
            let record = record.map_err(|source| ImportError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            report.rows += 1;
            if import_row(&record).map_err(|err| err.at(path, line))? {
                report.created += 1;
            } else {
                tracing::debug!(line, kind = kind.noun(), "row already imported");
            }
        }

        tracing::info!(
            path = %path.display(),
            kind = kind.noun(),
            rows = report.rows,
            created = report.created,
            "import finished"
        );
        Ok(report)
    }

    fn reader(&self, path: &Path) -> Result<csv::Reader<File>, ImportError> {
        let delimiter = self.settings.delimiter;
        if !delimiter.is_ascii() {
            return Err(ImportError::InvalidDelimiter(delimiter));
        }

        csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| ImportError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Resolve author and category, then create the book unless the exact
    /// tuple already exists. Returns whether a book was created.
    fn upsert_book(&self, row: &BookRow) -> Result<bool, RowError> {
        let tx = self.store.begin()?;

        let author = match tx.find_author(&row.author.first_name, &row.author.last_name)? {
            Some(author) => author,
            None => tx.create_author(&row.author)?,
        };
        let category = match tx.find_category(&row.category)? {
            Some(category) => category,
            None => tx.create_category(&row.category)?,
        };

        let draft = NewBook {
            title: row.title.clone(),
            isbn: row.isbn,
            author_id: author.id,
            category_id: category.id,
        };
        let created = match tx.find_book(&draft)? {
            Some(_) => false,
            None => {
                tx.create_book(&draft)?;
                true
            }
        };

        tx.commit()?;
        Ok(created)
    }

    /// Attach an opinion to the book with the row's ISBN unless the exact
    /// opinion already exists. A missing book is fatal.
    fn upsert_opinion(&self, row: &OpinionRow) -> Result<bool, RowError> {
        let tx = self.store.begin()?;

        let book = tx
            .find_book_by_isbn(row.isbn)?
            .ok_or(RowError::MissingBook(row.isbn))?;

        let draft = NewOpinion {
            rate: row.rate,
            description: row.description.clone(),
            book_id: book.id,
        };
        let created = match tx.find_opinion(&draft)? {
            Some(_) => false,
            None => {
                tx.create_opinion(&draft)?;
                true
            }
        };

        tx.commit()?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::models::BookFilter;
    use crate::modules::catalog::sqlite::tests::memory_catalog;
    use crate::modules::catalog::sqlite::SqliteCatalog;
    use crate::modules::catalog::store::CatalogTx;
    use shelf_db::ConstraintKind;
    use tempfile::TempDir;

    const BOOKS: &str = "\
ISBN;Tytuł;Autor;Kategoria
9788372783301;Brzydkie kaczątko;Hans Christian Andersen;Bajka
9321321345432;Dziady cz. III;Adam Mickiewicz;Lektury
9788324032556;Pan Tadeusz;Adam Mickiewicz;Lektury
";

    const OPINIONS: &str = "\
ISBN;Ocena;Opis
9788372783301;5;Piękna baśń
9788372783301;3;Trochę smutna
9321321345432;4;Klasyka
";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn books_in(catalog: &SqliteCatalog) -> Vec<String> {
        catalog
            .snapshot()
            .unwrap()
            .list_books(&BookFilter::default())
            .unwrap()
            .into_iter()
            .map(|entry| entry.book.title)
            .collect()
    }

    #[test]
    fn book_import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "ksiazki.csv", BOOKS);
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let importer = Importer::new(&catalog, &settings);

        let first = importer.import_path(&path).unwrap().unwrap();
        assert_eq!(first.kind, ImportKind::Books);
        assert_eq!(first.rows, 3);
        assert_eq!(first.created, 3);
        assert_eq!(first.to_string(), "Successfully imported 3 books!");

        let second = importer.import_path(&path).unwrap().unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.to_string(), "No new books to import.");
        assert_eq!(books_in(&catalog).len(), 3);
    }

    #[test]
    fn book_import_splits_author_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "ksiazki.csv", BOOKS);
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        Importer::new(&catalog, &settings)
            .import_path(&path)
            .unwrap();

        let tx = catalog.snapshot().unwrap();
        let andersen = tx.find_author("Hans", "Andersen").unwrap().unwrap();
        assert_eq!(andersen.second_name, "Christian");
        let mickiewicz = tx.find_author("Adam", "Mickiewicz").unwrap().unwrap();
        assert_eq!(mickiewicz.second_name, "");

        let books = tx.list_books(&BookFilter::default()).unwrap();
        assert_eq!(books[1].author.id, books[2].author.id);
        assert_eq!(books[1].category.id, books[2].category.id);
    }

    #[test]
    fn existing_second_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "ksiazki.csv",
            "isbn;title;author;category
9788300000001;Pierwsza;Jan Maria Rokita;Polityka
9788300000002;Druga;Jan Rokita;Polityka
",
        );
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let report = Importer::new(&catalog, &settings)
            .import_path(&path)
            .unwrap()
            .unwrap();
        assert_eq!(report.created, 2);

        let tx = catalog.snapshot().unwrap();
        let author = tx.find_author("Jan", "Rokita").unwrap().unwrap();
        assert_eq!(author.second_name, "Maria");
    }

    #[test]
    fn conflicting_isbn_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "ksiazki.csv",
            "isbn;title;author;category
9788372783301;Brzydkie kaczątko;Hans Christian Andersen;Bajka
9788372783301;Calineczka;Hans Christian Andersen;Bajka
9321321345432;Dziady cz. III;Adam Mickiewicz;Lektury
",
        );
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let err = Importer::new(&catalog, &settings)
            .import_path(&path)
            .unwrap_err();

        match err {
            ImportError::Catalog { line, source, .. } => {
                assert_eq!(line, 3);
                assert_eq!(source.constraint_kind(), Some(ConstraintKind::Unique));
            }
            other => panic!("expected a catalog error, got {other:?}"),
        }
        assert_eq!(books_in(&catalog), vec!["Brzydkie kaczątko".to_string()]);
    }

    #[test]
    fn opinion_import_attaches_to_books() {
        let dir = tempfile::tempdir().unwrap();
        let books = write(&dir, "ksiazki.csv", BOOKS);
        let opinions = write(&dir, "opinie.csv", OPINIONS);
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let importer = Importer::new(&catalog, &settings);
        importer.import_path(&books).unwrap();

        let first = importer.import_path(&opinions).unwrap().unwrap();
        assert_eq!(first.kind, ImportKind::Opinions);
        assert_eq!(first.created, 3);
        assert_eq!(first.to_string(), "Successfully imported 3 opinions!");

        let second = importer.import_path(&opinions).unwrap().unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.to_string(), "No new opinions to import.");

        let tx = catalog.snapshot().unwrap();
        let listed = tx.list_books(&BookFilter::default()).unwrap();
        assert_eq!(listed[0].opinion_ids.len(), 2);
        assert_eq!(listed[1].opinion_ids.len(), 1);
        assert!(listed[2].opinion_ids.is_empty());
    }

    #[test]
    fn missing_book_aborts_opinion_import() {
        let dir = tempfile::tempdir().unwrap();
        let books = write(&dir, "ksiazki.csv", BOOKS);
        let opinions = write(
            &dir,
            "opinie.csv",
            "isbn;rate;description
9788372783301;5;Piękna baśń
9780000000000;4;Nie ma takiej książki
9321321345432;4;Klasyka
",
        );
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let importer = Importer::new(&catalog, &settings);
        importer.import_path(&books).unwrap();

        let err = importer.import_path(&opinions).unwrap_err();
        assert!(err.to_string().contains("9780000000000"));
        match err {
            ImportError::MissingBook { isbn, line, .. } => {
                assert_eq!(isbn.to_string(), "9780000000000");
                assert_eq!(line, 3);
            }
            other => panic!("expected a missing book error, got {other:?}"),
        }

        // Nothing after the missing book was imported.
        let tx = catalog.snapshot().unwrap();
        assert_eq!(tx.list_opinions().unwrap().len(), 1);
    }

    #[test]
    fn unknown_file_name_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "books.csv", BOOKS);
        let catalog = memory_catalog();
        let settings = ImportSettings::default();

        let outcome = Importer::new(&catalog, &settings)
            .import_path(&path)
            .unwrap();
        assert!(outcome.is_none());
        assert!(books_in(&catalog).is_empty());
    }

    #[test]
    fn configured_file_names_and_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "books.tsv",
            "isbn\ttitle\tauthor\tcategory\n9788372783301\tBrzydkie kaczątko\tHans Christian Andersen\tBajka\n",
        );
        let catalog = memory_catalog();
        let settings = ImportSettings {
            delimiter: '\t',
            books_file: "books.tsv".to_string(),
            ..ImportSettings::default()
        };

        let report = Importer::new(&catalog, &settings)
            .import_path(&path)
            .unwrap()
            .unwrap();
        assert_eq!(report.created, 1);
    }

    #[test]
    fn malformed_rows_report_their_line() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let importer = Importer::new(&catalog, &settings);

        let short = write(
            &dir,
            "ksiazki.csv",
            "isbn;title;author;category\n9788372783301;Brzydkie kaczątko;Hans Christian Andersen\n",
        );
        match importer.import_path(&short).unwrap_err() {
            ImportError::MalformedRow { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 4 fields"));
            }
            other => panic!("expected a malformed row, got {other:?}"),
        }

        let bad_isbn = write(
            &dir,
            "ksiazki.csv",
            "isbn;title;author;category\n97883727;Brzydkie kaczątko;Hans Christian Andersen;Bajka\n",
        );
        assert!(matches!(
            importer.import_path(&bad_isbn).unwrap_err(),
            ImportError::MalformedRow { line: 2, .. }
        ));

        let bad_rate = write(
            &dir,
            "opinie.csv",
            "isbn;rate;description\n9788372783301;pięć;Piękna baśń\n",
        );
        assert!(matches!(
            importer.import_path(&bad_rate).unwrap_err(),
            ImportError::MalformedRow { line: 2, .. }
        ));
    }

    #[test]
    fn out_of_range_rate_is_rejected_by_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let books = write(&dir, "ksiazki.csv", BOOKS);
        let opinions = write(
            &dir,
            "opinie.csv",
            "isbn;rate;description\n9788372783301;6;Za wysoko\n",
        );
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let importer = Importer::new(&catalog, &settings);
        importer.import_path(&books).unwrap();

        match importer.import_path(&opinions).unwrap_err() {
            ImportError::Catalog { source, .. } => {
                assert_eq!(source.constraint_kind(), Some(ConstraintKind::Check));
            }
            other => panic!("expected a constraint error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = memory_catalog();
        let settings = ImportSettings::default();
        let err = Importer::new(&catalog, &settings)
            .import_path(&dir.path().join("ksiazki.csv"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Read { .. }));
    }
}
