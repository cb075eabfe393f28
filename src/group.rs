/// LiveShelf Grouping - Dynamic Partitioning into Named Shelves
///
/// A `GroupedView` partitions its parent's records into shelves keyed by a
/// caller-supplied function. A book may map to several keys (one shelf per
/// tag) or to none. Shelves exist exactly while they have members: the first
/// book filed under a key creates the shelf, removing the last drops it.
///
/// Each record delta from the parent is translated into member mutations on
/// the affected shelves plus one coalesced name-level delta on the backing
/// set's channel, so a batch touching many shelves still notifies set
/// subscribers once.

use crate::book::{Book, BookId};
use crate::channel::{DeferGuard, ListenerId, ShelfChannel};
use crate::delta::{BooksDelta, ShelvesDelta};
use crate::order::ShelfOrder;
use crate::shelf::{Shelf, ShelfSet};
use crate::view::{subscribe_weak, BookView};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A live partition of a parent view into named, ordered shelves.
///
/// # Examples
///
/// ```
/// use liveshelf::{Book, Library, ShelfOrder, ViewCompose};
///
/// let library = Library::new();
/// let by_author = library.grouped_by(|b| vec![b.author.clone()], ShelfOrder::Name);
///
/// library.add(vec![
///     Book::new("b1", "Solaris", "Lem"),
///     Book::new("b2", "Fiasco", "Lem"),
///     Book::new("b3", "Dune", "Herbert"),
/// ]);
///
/// assert_eq!(by_author.shelves().names(), vec!["Herbert", "Lem"]);
/// assert_eq!(by_author.shelves().get("Lem").unwrap().len(), 2);
/// ```
pub struct GroupedView {
    parent: Rc<dyn BookView>,
    key_fn: Box<dyn Fn(&Book) -> Vec<String>>,
    shelves: Rc<ShelfSet>,
    /// Maps each id to the deduplicated keys the book is currently filed
    /// under. A
    /// modification's new keys are diffed against this to decide which
    /// shelves gain, lose, or merely update the book.
    saved_keys: RefCell<HashMap<BookId, Vec<String>>>,
    upstream: Cell<Option<ListenerId>>,
}

impl GroupedView {
    pub fn new<V, F>(parent: Rc<V>, key_fn: F, order: ShelfOrder) -> Rc<Self>
    where
        V: BookView + 'static,
        F: Fn(&Book) -> Vec<String> + 'static,
    {
        Self::construct(parent, Box::new(key_fn), ShelfSet::new(order))
    }

    /// Deterministic construction; only `Random` set order consults the RNG.
    pub fn with_seed<V, F>(parent: Rc<V>, key_fn: F, order: ShelfOrder, seed: u64) -> Rc<Self>
    where
        V: BookView + 'static,
        F: Fn(&Book) -> Vec<String> + 'static,
    {
        Self::construct(parent, Box::new(key_fn), ShelfSet::with_seed(order, seed))
    }

    fn construct<V: BookView + 'static>(
        parent: Rc<V>,
        key_fn: Box<dyn Fn(&Book) -> Vec<String>>,
        shelves: Rc<ShelfSet>,
    ) -> Rc<Self> {
        let parent: Rc<dyn BookView> = parent;
        let view = Rc::new(GroupedView {
            parent: parent.clone(),
            key_fn,
            shelves,
            saved_keys: RefCell::new(HashMap::new()),
            upstream: Cell::new(None),
        });
        view.rebuild_from(view.parent.books());
        let sub = subscribe_weak(&parent, &view, GroupedView::apply_parent_delta);
        view.upstream.set(Some(sub));
        view
    }

    /// The backing ordered set of live shelves. Subscribe to its channel for
    /// name-level deltas; each shelf's own record channel reports member
    /// changes.
    pub fn shelves(&self) -> &Rc<ShelfSet> {
        &self.shelves
    }

    pub fn channel(&self) -> &ShelfChannel {
        self.shelves.channel()
    }

    pub fn defer(&self) -> DeferGuard<'_, ShelvesDelta> {
        self.shelves.channel().defer()
    }

    /// The keys a book is currently filed under, if it is grouped here.
    pub fn keys_of(&self, id: &str) -> Option<Vec<String>> {
        self.saved_keys.borrow().get(id).cloned()
    }

    /// Drop the upstream subscription permanently.
    pub fn detach(&self) {
        if let Some(id) = self.upstream.take() {
            self.parent.channel().unsubscribe(id);
        }
    }

    /// Apply the key function and deduplicate, keeping first occurrence
    /// order. A key repeated by the function must not file the book twice.
    fn keys_for(&self, book: &Book) -> Vec<String> {
        let mut keys = (self.key_fn)(book);
        let mut seen = HashSet::new();
        keys.retain(|key| seen.insert(key.clone()));
        keys
    }

    /// File a book under `key`, creating the shelf on first member.
    fn file(&self, book: &Book, key: &str) {
        if let Some(shelf) = self.shelves.get(key) {
            shelf.books().add(vec![book.clone()]);
            self.shelves.notify_modified(key);
        } else {
            log::debug!("group: creating shelf '{key}'");
            self.shelves.insert(Shelf::with_books(key, vec![book.clone()]));
        }
    }

    /// Remove a book from the shelf it is filed under, dropping the shelf
    /// when its last member leaves.
    fn unfile(&self, id: &BookId, key: &str) {
        let shelf = self
            .shelves
            .get(key)
            .unwrap_or_else(|| panic!("shelf '{key}' missing from group"));
        shelf.books().remove(std::slice::from_ref(id));
        if shelf.is_empty() {
            log::debug!("group: dropping empty shelf '{key}'");
            self.shelves.remove(key);
        } else {
            self.shelves.notify_modified(key);
        }
    }

    fn apply_added(&self, book: &Book) {
        let keys = self.keys_for(book);
        if self
            .saved_keys
            .borrow_mut()
            .insert(book.id.clone(), keys.clone())
            .is_some()
        {
            panic!("book '{}' already present in group", book.id);
        }
        for key in &keys {
            self.file(book, key);
        }
    }

    fn apply_modified(&self, book: &Book) {
        let old_keys = self.saved_keys.borrow().get(&book.id).cloned();
        let Some(old_keys) = old_keys else {
            // An upstream filter re-partitions by current truth; first sight
            // of this id is an add here.
            self.apply_added(book);
            return;
        };

        let new_keys = self.keys_for(book);
        let old_set: HashSet<&String> = old_keys.iter().collect();
        let new_set: HashSet<&String> = new_keys.iter().collect();

        for key in &old_keys {
            if new_set.contains(key) {
                // Same shelf before and after; refresh the stored value.
                let shelf = self
                    .shelves
                    .get(key)
                    .unwrap_or_else(|| panic!("shelf '{key}' missing from group"));
                shelf.books().replace(vec![book.clone()]);
                self.shelves.notify_modified(key);
            } else {
                self.unfile(&book.id, key);
            }
        }
        for key in &new_keys {
            if !old_set.contains(key) {
                self.file(book, key);
            }
        }

        self.saved_keys.borrow_mut().insert(book.id.clone(), new_keys);
    }

    fn apply_removed(&self, id: &BookId) {
        // Unknown ids are tolerated: an upstream filter may report a removal
        // the group never held.
        let Some(keys) = self.saved_keys.borrow_mut().remove(id) else {
            return;
        };
        for key in &keys {
            self.unfile(id, key);
        }
    }

    fn rebuild_from(&self, books: Vec<Book>) {
        let mut groups: HashMap<String, Vec<Book>> = HashMap::new();
        let mut saved = HashMap::new();
        for book in books {
            let keys = self.keys_for(&book);
            for key in &keys {
                groups.entry(key.clone()).or_default().push(book.clone());
            }
            saved.insert(book.id.clone(), keys);
        }
        *self.saved_keys.borrow_mut() = saved;
        let shelves = groups
            .into_iter()
            .map(|(name, members)| Shelf::with_books(name, members))
            .collect();
        self.shelves.reset(shelves);
    }

    fn apply_parent_delta(&self, delta: &BooksDelta) {
        match delta {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                // One coalesced name-level delta per incoming batch, however
                // many shelves it touches.
                let _guard = self.shelves.channel().defer();
                for book in removed {
                    self.apply_removed(&book.id);
                }
                for book in modified {
                    self.apply_modified(book);
                }
                for book in added {
                    self.apply_added(book);
                }
            }
            BooksDelta::ThumbnailsChanged { touched } => {
                // Display-only: forward to each owning shelf's member view,
                // never to the name-level channel.
                for id in touched {
                    let keys = self.saved_keys.borrow().get(id).cloned();
                    if let Some(keys) = keys {
                        for key in &keys {
                            if let Some(shelf) = self.shelves.get(key) {
                                shelf.books().touch_covers(std::slice::from_ref(id));
                            }
                        }
                    }
                }
            }
            BooksDelta::Refresh => {
                log::debug!("group: rebuilding from parent after refresh");
                self.rebuild_from(self.parent.books());
            }
        }
    }
}
