//! Catalog domain models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 13-digit book identifier.
///
/// Stored as a number, so leading zeros are not significant; it is always
/// rendered zero-padded to 13 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(u64);

impl Isbn {
    pub const DIGITS: usize = 13;
    pub const MAX: u64 = 9_999_999_999_999;

    pub fn new(value: u64) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:013}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a 13-digit ISBN")]
pub struct InvalidIsbn(pub String);

impl FromStr for Isbn {
    type Err = InvalidIsbn;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value.trim();
        if digits.len() != Self::DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidIsbn(value.to_string()));
        }
        digits
            .parse::<u64>()
            .map(Isbn)
            .map_err(|_| InvalidIsbn(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second_name.is_empty() {
            write!(f, "{} {}", self.first_name, self.last_name)
        } else {
            write!(
                f,
                "{} {} {}",
                self.first_name, self.second_name, self.last_name
            )
        }
    }
}

/// Author fields before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub first_name: String,
    pub second_name: String,
    pub last_name: String,
}

impl NewAuthor {
    pub fn new(
        first_name: impl Into<String>,
        second_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            second_name: second_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Split a free-text author name on whitespace.
    ///
    /// The first token is the first name, the last token the last name, and
    /// everything between (single-space joined) the second name. A single
    /// token is used as both first and last name. Returns `None` for blank
    /// input.
    pub fn parse(full_name: &str) -> Option<Self> {
        let tokens: Vec<&str> = full_name.split_whitespace().collect();
        let (first, rest) = tokens.split_first()?;
        let (last, middle) = match rest.split_last() {
            Some((last, middle)) => (*last, middle),
            None => (*first, &[][..]),
        };
        Some(Self::new(*first, middle.join(" "), last))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: Isbn,
    pub author_id: i64,
    pub category_id: i64,
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, ISBN: {}", self.title, self.isbn)
    }
}

/// Book fields before insertion; also the full key used for upserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub isbn: Isbn,
    pub author_id: i64,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opinion {
    pub id: i64,
    pub rate: u8,
    pub description: String,
    pub book_id: i64,
}

impl fmt::Display for Opinion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, '{}'", self.rate, self.description)
    }
}

/// Opinion fields before insertion; also the full key used for upserts.
///
/// `rate` is range-checked by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOpinion {
    pub rate: u8,
    pub description: String,
    pub book_id: i64,
}

/// A book joined with everything its listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    pub book: Book,
    pub author: Author,
    pub category: Category,
    pub opinion_ids: Vec<i64>,
}

/// An opinion joined with the book it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpinionEntry {
    pub opinion: Opinion,
    pub book: Book,
}

/// Title predicates for book listings. Set predicates are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookFilter {
    /// Case-insensitive exact title match.
    #[serde(rename = "title__iexact")]
    pub title_iexact: Option<String>,
    /// Case-sensitive substring match.
    #[serde(rename = "title__contains")]
    pub title_contains: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(first: &str, second: &str, last: &str) -> Author {
        Author {
            id: 1,
            first_name: first.to_string(),
            second_name: second.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn author_display_with_second_name() {
        assert_eq!(
            author("Hans", "Christian", "Andersen").to_string(),
            "Hans Christian Andersen"
        );
    }

    #[test]
    fn author_display_without_second_name() {
        assert_eq!(author("Adam", "", "Mickiewicz").to_string(), "Adam Mickiewicz");
    }

    #[test]
    fn parse_two_part_name() {
        assert_eq!(
            NewAuthor::parse("Adam Mickiewicz"),
            Some(NewAuthor::new("Adam", "", "Mickiewicz"))
        );
    }

    #[test]
    fn parse_middle_names() {
        assert_eq!(
            NewAuthor::parse("Hans Christian Andersen"),
            Some(NewAuthor::new("Hans", "Christian", "Andersen"))
        );
        assert_eq!(
            NewAuthor::parse("  John  Ronald   Reuel Tolkien "),
            Some(NewAuthor::new("John", "Ronald Reuel", "Tolkien"))
        );
    }

    #[test]
    fn parse_single_token_and_blank() {
        assert_eq!(
            NewAuthor::parse("Homer"),
            Some(NewAuthor::new("Homer", "", "Homer"))
        );
        assert_eq!(NewAuthor::parse("   "), None);
    }

    #[test]
    fn isbn_requires_thirteen_digits() {
        let isbn: Isbn = "9788372783301".parse().unwrap();
        assert_eq!(isbn.get(), 9788372783301);
        assert_eq!(" 9788372783301 ".parse::<Isbn>().unwrap(), isbn);
        assert!("978837278330".parse::<Isbn>().is_err());
        assert!("97883727833011".parse::<Isbn>().is_err());
        assert!("978-837278330".parse::<Isbn>().is_err());
        assert!("+978837278330".parse::<Isbn>().is_err());
    }

    #[test]
    fn isbn_renders_zero_padded() {
        let isbn: Isbn = "0012345678901".parse().unwrap();
        assert_eq!(isbn.to_string(), "0012345678901");
        assert!(Isbn::new(Isbn::MAX + 1).is_none());
    }

    #[test]
    fn book_and_opinion_display() {
        let book = Book {
            id: 1,
            title: "Brzydkie kaczątko".to_string(),
            isbn: "9788372783301".parse().unwrap(),
            author_id: 1,
            category_id: 1,
        };
        assert_eq!(book.to_string(), "Brzydkie kaczątko, ISBN: 9788372783301");

        let opinion = Opinion {
            id: 1,
            rate: 5,
            description: "Test 1".to_string(),
            book_id: 1,
        };
        assert_eq!(opinion.to_string(), "5, 'Test 1'");
    }
}
