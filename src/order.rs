/// Order - Comparator Selectors for Books and Shelves
///
/// A selector is a token chosen by the caller; the sort components map it to
/// a concrete total-order comparator, or to "random". Every comparator ends
/// its tie-break chain on a unique key (book id, shelf name), so binary
/// search over a sorted sequence always lands on exactly one record even
/// when the primary keys collide.

use crate::book::Book;
use crate::shelf::Shelf;
use std::cmp::Ordering;

/// Orderings a `SortedView` can maintain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookOrder {
    /// Title, then author, then id.
    Title,
    /// Author, then title, then id.
    AuthorTitle,
    /// Page count descending, then added-at descending, then title, then id.
    PageCount,
    /// No total order; incremental maintenance inserts at a random position.
    Random,
}

impl BookOrder {
    pub fn is_random(self) -> bool {
        matches!(self, BookOrder::Random)
    }

    /// Compare two books under this selector.
    ///
    /// Must not be called for `Random`: random order has no comparator, and
    /// reaching this dispatch point with it is a bug in the caller.
    pub fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            BookOrder::Title => by_title(a, b),
            BookOrder::AuthorTitle => a
                .author
                .cmp(&b.author)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id)),
            BookOrder::PageCount => b
                .page_count
                .cmp(&a.page_count)
                .then_with(|| b.added_at.cmp(&a.added_at))
                .then_with(|| by_title(a, b)),
            BookOrder::Random => unreachable!("random order has no comparator"),
        }
    }
}

fn by_title(a: &Book, b: &Book) -> Ordering {
    a.title
        .cmp(&b.title)
        .then_with(|| a.author.cmp(&b.author))
        .then_with(|| a.id.cmp(&b.id))
}

/// Orderings a `ShelfSet` can maintain over its named collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfOrder {
    /// Shelf name.
    Name,
    /// Member count descending, then name.
    Size,
    /// No total order; insertion at a random position.
    Random,
}

impl ShelfOrder {
    pub fn is_random(self) -> bool {
        matches!(self, ShelfOrder::Random)
    }

    /// Compare two shelves under this selector. Must not be called for
    /// `Random`.
    pub fn compare(self, a: &Shelf, b: &Shelf) -> Ordering {
        match self {
            ShelfOrder::Name => a.name().cmp(b.name()),
            ShelfOrder::Size => b
                .len()
                .cmp(&a.len())
                .then_with(|| a.name().cmp(b.name())),
            ShelfOrder::Random => unreachable!("random order has no comparator"),
        }
    }
}
