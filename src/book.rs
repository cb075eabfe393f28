/// LiveShelf Book - The Domain Record
///
/// A Book is the unit every view operates on. It carries a stable, globally
/// unique identity plus a set of mutable descriptive attributes. Two book
/// values with the same id are "the same book, possibly updated"; the id
/// never changes across updates.

use serde::{Deserialize, Serialize};

/// Stable identity of a book across updates.
pub type BookId = String;

/// A single library record.
///
/// Only `id` participates in identity; every other field is a mutable
/// attribute that views may filter, sort, or group by.
///
/// # Examples
///
/// ```
/// use liveshelf::Book;
///
/// let book = Book::new("b1", "Dune", "Herbert")
///     .with_tags(["sci-fi", "classic"])
///     .with_pages(412);
///
/// assert_eq!(book.id, "b1");
/// assert_eq!(book.tags.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// Zero or more free-form tags; a book may be filed under several groups.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub page_count: u32,
    /// Unix timestamp of when the book entered the library.
    #[serde(default)]
    pub added_at: i64,
    /// Bumped whenever the cover art is regenerated; display-only.
    #[serde(default)]
    pub cover_revision: u64,
}

impl Book {
    pub fn new(id: impl Into<BookId>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Book {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            tags: Vec::new(),
            page_count: 0,
            added_at: 0,
            cover_revision: 0,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pages(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn with_added_at(mut self, added_at: i64) -> Self {
        self.added_at = added_at;
        self
    }
}
