/// LiveShelf Shelves - Named Collections and Ordered Sets of Them
///
/// A Shelf is a (name, view) pair representing one partition of the library:
/// a tag, an author bucket, a user-curated reading list. Its member view is a
/// full `Library`, so every shelf exposes the complete record-delta channel
/// to its own subscribers, independent of the group-level channel.
///
/// A `ShelfSet` keeps shelves ordered under a `ShelfOrder` selector and emits
/// name-level deltas on its own channel. `ShelfAggregate` merges
/// externally-owned shelves into one set, showing each member exactly while
/// it is non-empty.

use crate::book::Book;
use crate::channel::{DeferGuard, ListenerId, ShelfChannel};
use crate::delta::{BooksDelta, ShelvesDelta};
use crate::library::Library;
use crate::order::ShelfOrder;
use crate::view::BookView;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// One named collection of books. Cheap to clone; clones share the member
/// view.
#[derive(Clone)]
pub struct Shelf {
    name: String,
    books: Rc<Library>,
}

impl Shelf {
    pub fn new(name: impl Into<String>) -> Self {
        Shelf {
            name: name.into(),
            books: Library::new(),
        }
    }

    pub fn with_books(name: impl Into<String>, books: Vec<Book>) -> Self {
        let shelf = Self::new(name);
        shelf.books.add(books);
        shelf
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shelf's member view; mutate it through the normal `Library`
    /// operations.
    pub fn books(&self) -> &Rc<Library> {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

struct ShelfSetState {
    /// Ordered under the active selector (arbitrary under `Random`).
    seq: Vec<Shelf>,
    by_name: HashMap<String, Shelf>,
}

/// An ordered set of named collections with its own group-delta channel.
///
/// Shelf names are unique within a set; inserting a duplicate name or
/// removing an unknown one is a contract violation and panics.
pub struct ShelfSet {
    order: Cell<ShelfOrder>,
    state: RefCell<ShelfSetState>,
    rng: RefCell<SmallRng>,
    channel: ShelfChannel,
}

impl ShelfSet {
    pub fn new(order: ShelfOrder) -> Rc<Self> {
        Self::with_rng(order, SmallRng::from_entropy())
    }

    /// Deterministic construction; only `Random` order consults the RNG.
    pub fn with_seed(order: ShelfOrder, seed: u64) -> Rc<Self> {
        Self::with_rng(order, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(order: ShelfOrder, rng: SmallRng) -> Rc<Self> {
        Rc::new(ShelfSet {
            order: Cell::new(order),
            state: RefCell::new(ShelfSetState {
                seq: Vec::new(),
                by_name: HashMap::new(),
            }),
            rng: RefCell::new(rng),
            channel: ShelfChannel::new(),
        })
    }

    pub fn order(&self) -> ShelfOrder {
        self.order.get()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().seq.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.borrow().by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Shelf> {
        self.state.borrow().by_name.get(name).cloned()
    }

    /// Snapshot of the shelves in the maintained order.
    pub fn shelves(&self) -> Vec<Shelf> {
        self.state.borrow().seq.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.state
            .borrow()
            .seq
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Position of `name` in the maintained order. Binary search under the
    /// comparator selectors, linear scan under `Random`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.position_of(&self.state.borrow(), name)
    }

    /// The sequence is sorted under the active comparator at all observable
    /// times, so the registered shelf itself supplies the search key. Under
    /// `Random` there is no comparator and only a scan can answer.
    fn position_of(&self, state: &ShelfSetState, name: &str) -> Option<usize> {
        match self.order.get() {
            ShelfOrder::Random => state.seq.iter().position(|s| s.name() == name),
            order => {
                let shelf = state.by_name.get(name)?;
                state
                    .seq
                    .binary_search_by(|probe| order.compare(probe, shelf))
                    .ok()
            }
        }
    }

    /// Insert a shelf at its ordered position. Panics if the name is taken.
    pub fn insert(&self, shelf: Shelf) {
        let name = shelf.name().to_string();
        {
            let mut state = self.state.borrow_mut();
            if state.by_name.contains_key(&name) {
                panic!("shelf '{name}' already present in set");
            }
            let order = self.order.get();
            let pos = if order.is_random() {
                self.rng.borrow_mut().gen_range(0..=state.seq.len())
            } else {
                match state
                    .seq
                    .binary_search_by(|probe| order.compare(probe, &shelf))
                {
                    Ok(_) => panic!("shelf '{name}' already present in set"),
                    Err(pos) => pos,
                }
            };
            state.seq.insert(pos, shelf.clone());
            state.by_name.insert(name.clone(), shelf);
        }
        self.channel
            .emit(ShelvesDelta::changed(vec![name], vec![], vec![]));
    }

    /// Remove a shelf by name, returning it. Panics if the name is unknown.
    pub fn remove(&self, name: &str) -> Shelf {
        let shelf = {
            let mut state = self.state.borrow_mut();
            let pos = self
                .position_of(&state, name)
                .unwrap_or_else(|| panic!("shelf '{name}' not found in set"));
            let shelf = state.seq.remove(pos);
            state.by_name.remove(name);
            shelf
        };
        self.channel
            .emit(ShelvesDelta::changed(vec![], vec![], vec![name.to_string()]));
        shelf
    }

    /// Re-sort the set in place under a new selector and emit `Refresh`.
    pub fn sort(&self, order: ShelfOrder) {
        self.order.set(order);
        {
            let mut state = self.state.borrow_mut();
            if order.is_random() {
                state.seq.shuffle(&mut *self.rng.borrow_mut());
            } else {
                state.seq.sort_by(|a, b| order.compare(a, b));
            }
        }
        self.channel.emit(ShelvesDelta::Refresh);
    }

    pub fn channel(&self) -> &ShelfChannel {
        &self.channel
    }

    pub fn defer(&self) -> DeferGuard<'_, ShelvesDelta> {
        self.channel.defer()
    }

    /// A shelf's contents changed while it stays in the set: re-establish its
    /// ordered position (the `Size` selector keys on member count) and emit a
    /// `modified` notification for the name.
    pub(crate) fn notify_modified(&self, name: &str) {
        {
            let mut state = self.state.borrow_mut();
            let order = self.order.get();
            // The shelf's sort key already changed (the `Size` selector keys
            // on member count), so its old slot is only findable by scan.
            let pos = state
                .seq
                .iter()
                .position(|s| s.name() == name)
                .unwrap_or_else(|| panic!("shelf '{name}' not found in set"));
            if !order.is_random() {
                let shelf = state.seq.remove(pos);
                let new_pos = match state
                    .seq
                    .binary_search_by(|probe| order.compare(probe, &shelf))
                {
                    // Ok is unreachable: the name tie-break makes the
                    // comparator total and the name was just removed.
                    Ok(pos) | Err(pos) => pos,
                };
                state.seq.insert(new_pos, shelf);
            }
        }
        self.channel
            .emit(ShelvesDelta::changed(vec![], vec![name.to_string()], vec![]));
    }

    /// Replace the whole contents and emit `Refresh`; used by grouping when
    /// its parent invalidates wholesale.
    pub(crate) fn reset(&self, mut shelves: Vec<Shelf>) {
        {
            let mut state = self.state.borrow_mut();
            let order = self.order.get();
            if order.is_random() {
                shelves.shuffle(&mut *self.rng.borrow_mut());
            } else {
                shelves.sort_by(|a, b| order.compare(a, b));
            }
            state.by_name = shelves
                .iter()
                .map(|s| (s.name().to_string(), s.clone()))
                .collect();
            state.seq = shelves;
        }
        self.channel.emit(ShelvesDelta::Refresh);
    }
}

/// Merges several independently-owned shelves into one ordered set.
///
/// The aggregate subscribes to each member's own record channel; a member's
/// name is present in the backing set exactly while the member is non-empty.
/// Registration itself is owner-controlled: `add_shelf` and `remove_shelf`
/// admit or retire a member regardless of how many books it holds.
///
/// # Examples
///
/// ```
/// use liveshelf::{Book, Shelf, ShelfAggregate, ShelfOrder};
///
/// let aggregate = ShelfAggregate::new(ShelfOrder::Name);
/// let favorites = Shelf::new("favorites");
/// aggregate.add_shelf(favorites.clone());
///
/// // Empty members are registered but not visible.
/// assert!(!aggregate.shelves().contains("favorites"));
///
/// favorites.books().add(vec![Book::new("b1", "Dune", "Herbert")]);
/// assert!(aggregate.shelves().contains("favorites"));
/// ```
pub struct ShelfAggregate {
    set: Rc<ShelfSet>,
    members: RefCell<HashMap<String, (Shelf, ListenerId)>>,
    /// Handle to ourselves for member subscriptions; the closures must not
    /// keep the aggregate alive.
    weak_self: Weak<ShelfAggregate>,
}

impl ShelfAggregate {
    pub fn new(order: ShelfOrder) -> Rc<Self> {
        Self::construct(ShelfSet::new(order))
    }

    pub fn with_seed(order: ShelfOrder, seed: u64) -> Rc<Self> {
        Self::construct(ShelfSet::with_seed(order, seed))
    }

    fn construct(set: Rc<ShelfSet>) -> Rc<Self> {
        Rc::new_cyclic(|weak| ShelfAggregate {
            set,
            members: RefCell::new(HashMap::new()),
            weak_self: weak.clone(),
        })
    }

    /// The visible, ordered set of non-empty members. Subscribe to its
    /// channel for name-level deltas.
    pub fn shelves(&self) -> &Rc<ShelfSet> {
        &self.set
    }

    /// Look up a registered member, visible or not.
    pub fn member(&self, name: &str) -> Option<Shelf> {
        self.members.borrow().get(name).map(|(s, _)| s.clone())
    }

    pub fn member_count(&self) -> usize {
        self.members.borrow().len()
    }

    /// Register an externally-owned shelf. Panics if the name is already a
    /// member.
    pub fn add_shelf(&self, shelf: Shelf) {
        let name = shelf.name().to_string();
        if self.members.borrow().contains_key(&name) {
            panic!("shelf '{name}' is already an aggregate member");
        }

        let weak = self.weak_self.clone();
        let member_name = name.clone();
        let sub = shelf.books().channel().subscribe(move |delta| {
            if let Some(aggregate) = weak.upgrade() {
                aggregate.on_member_delta(&member_name, delta);
            }
        });

        self.members
            .borrow_mut()
            .insert(name, (shelf.clone(), sub));
        if !shelf.is_empty() {
            self.set.insert(shelf);
        }
    }

    /// Retire a member regardless of emptiness, returning it. Panics if the
    /// name is not a member.
    pub fn remove_shelf(&self, name: &str) -> Shelf {
        let (shelf, sub) = self
            .members
            .borrow_mut()
            .remove(name)
            .unwrap_or_else(|| panic!("shelf '{name}' is not an aggregate member"));
        shelf.books().channel().unsubscribe(sub);
        if self.set.contains(name) {
            self.set.remove(name);
        }
        shelf
    }

    fn on_member_delta(&self, name: &str, delta: &BooksDelta) {
        if matches!(delta, BooksDelta::ThumbnailsChanged { .. }) {
            // Display-only; never affects grouping.
            return;
        }
        let shelf = self.members.borrow().get(name).map(|(s, _)| s.clone());
        let Some(shelf) = shelf else {
            return;
        };

        if shelf.is_empty() {
            if self.set.contains(name) {
                log::debug!("aggregate: member '{name}' emptied, hiding");
                self.set.remove(name);
            }
        } else if self.set.contains(name) {
            self.set.notify_modified(name);
        } else {
            log::debug!("aggregate: member '{name}' non-empty, showing");
            self.set.insert(shelf);
        }
    }
}
