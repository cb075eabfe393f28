/// LiveShelf Library - The Mutable Base View
///
/// A Library owns the canonical mapping from identity to book for one
/// logical session. It is the only component that performs primitive
/// add/remove/replace and originates deltas from nothing; every other view
/// derives its
/// contents from a parent and re-establishes its invariant from incoming
/// deltas.
///
/// Misuse of the primitive operations (adding a present id, removing an
/// absent one) is a contract violation and panics; these are programmer
/// errors, not runtime conditions, and are never exposed to callers as
/// recoverable results.
///
/// # Examples
///
/// ```
/// use liveshelf::{Book, BookView, Library};
///
/// let library = Library::new();
/// library.add(vec![
///     Book::new("b1", "Dune", "Herbert"),
///     Book::new("b2", "Solaris", "Lem"),
/// ]);
///
/// assert_eq!(library.len(), 2);
/// assert!(library.contains("b1"));
/// assert_eq!(library.stored("b2").title, "Solaris");
/// ```

use crate::book::{Book, BookId};
use crate::channel::{BookChannel, DeferGuard};
use crate::delta::BooksDelta;
use crate::view::BookView;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub struct Library {
    books: RefCell<HashMap<BookId, Book>>,
    channel: BookChannel,
}

impl Library {
    pub fn new() -> Rc<Self> {
        Rc::new(Library {
            books: RefCell::new(HashMap::new()),
            channel: BookChannel::new(),
        })
    }

    /// Add books that must not already be present.
    ///
    /// Panics if any incoming id is already stored, or appears twice in the
    /// batch (I1: no view ever holds two books with the same id).
    pub fn add(&self, books: Vec<Book>) {
        {
            let stored = self.books.borrow();
            let mut batch: HashSet<&str> = HashSet::new();
            for book in &books {
                if stored.contains_key(&book.id) || !batch.insert(&book.id) {
                    panic!("book '{}' already present in library", book.id);
                }
            }
        }

        {
            let mut stored = self.books.borrow_mut();
            for book in &books {
                stored.insert(book.id.clone(), book.clone());
            }
        }

        log::debug!("library: added {} book(s)", books.len());
        self.channel.emit(BooksDelta::added(books));
    }

    /// Remove books by id. Panics if any id is absent.
    pub fn remove(&self, ids: &[BookId]) {
        let removed: Vec<Book> = {
            let mut stored = self.books.borrow_mut();
            ids.iter()
                .map(|id| {
                    stored
                        .remove(id)
                        .unwrap_or_else(|| panic!("book '{id}' not found in library"))
                })
                .collect()
        };

        log::debug!("library: removed {} book(s)", removed.len());
        self.channel.emit(BooksDelta::removed(removed));
    }

    /// Upsert: ids already present are reported as `modified` carrying the
    /// new value; ids only in the incoming set are reported as `added`.
    pub fn replace(&self, books: Vec<Book>) {
        let (added, modified) = {
            let mut stored = self.books.borrow_mut();
            let mut batch: HashSet<&str> = HashSet::new();
            for book in &books {
                if !batch.insert(&book.id) {
                    panic!("book '{}' appears twice in replace batch", book.id);
                }
            }

            let mut added = Vec::new();
            let mut modified = Vec::new();
            for book in books {
                let previous = stored.insert(book.id.clone(), book.clone());
                if previous.is_some() {
                    modified.push(book);
                } else {
                    added.push(book);
                }
            }
            (added, modified)
        };

        log::debug!(
            "library: replace -> {} added, {} modified",
            added.len(),
            modified.len()
        );
        self.channel
            .emit(BooksDelta::changed(added, modified, Vec::new()));
    }

    /// Wholesale replacement of the library's contents. Emits `Refresh`:
    /// downstream views discard cached state and rebuild by re-enumeration.
    pub fn refresh(&self, books: Vec<Book>) {
        {
            let mut stored = self.books.borrow_mut();
            stored.clear();
            for book in books {
                if stored.insert(book.id.clone(), book.clone()).is_some() {
                    panic!("book '{}' appears twice in refresh batch", book.id);
                }
            }
        }

        log::debug!("library: wholesale refresh ({} book(s))", self.len());
        self.channel.emit(BooksDelta::Refresh);
    }

    /// Signal that cover art changed for the given books. Display-only:
    /// membership, order and grouping are unaffected everywhere downstream.
    /// Absent ids are silently skipped.
    pub fn touch_covers(&self, ids: &[BookId]) {
        let touched: Vec<BookId> = {
            let stored = self.books.borrow();
            ids.iter()
                .filter(|id| stored.contains_key(*id))
                .cloned()
                .collect()
        };
        self.channel
            .emit(BooksDelta::ThumbnailsChanged { touched });
    }

    /// Open a deferral scope: mutations keep applying, but at most one
    /// coalesced notification fires when the guard drops.
    pub fn defer(&self) -> DeferGuard<'_, BooksDelta> {
        self.channel.defer()
    }
}

impl BookView for Library {
    fn len(&self) -> usize {
        self.books.borrow().len()
    }

    fn books(&self) -> Vec<Book> {
        self.books.borrow().values().cloned().collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.books.borrow().contains_key(id)
    }

    fn stored(&self, id: &str) -> Book {
        self.books
            .borrow()
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("book '{id}' not found in library"))
    }

    fn channel(&self) -> &BookChannel {
        &self.channel
    }
}
