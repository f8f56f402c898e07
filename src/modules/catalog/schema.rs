//! Catalog table definitions

use shelf_kernel::Migration;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS author (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL CHECK (length(first_name) <= 50),
    second_name TEXT NOT NULL DEFAULT '' CHECK (length(second_name) <= 100),
    last_name TEXT NOT NULL CHECK (length(last_name) <= 50),
    UNIQUE (first_name, last_name)
);

CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(name) <= 100)
);

CREATE TABLE IF NOT EXISTS book (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(title) <= 150),
    isbn INTEGER NOT NULL UNIQUE CHECK (isbn BETWEEN 0 AND 9999999999999),
    author_id INTEGER NOT NULL REFERENCES author(id) ON DELETE RESTRICT,
    category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS opinion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rate INTEGER NOT NULL CHECK (rate BETWEEN 1 AND 5),
    description TEXT NOT NULL CHECK (length(description) <= 500),
    book_id INTEGER NOT NULL REFERENCES book(id) ON DELETE CASCADE
);
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_book_author ON book(author_id);
CREATE INDEX IF NOT EXISTS idx_book_category ON book(category_id);
CREATE INDEX IF NOT EXISTS idx_opinion_book ON opinion(book_id);
"#;

pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_tables",
            up: CREATE_TABLES,
        },
        Migration {
            id: "002_indexes",
            up: CREATE_INDEXES,
        },
    ]
}
