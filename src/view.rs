/// LiveShelf View Implementation
///
/// Views are live, derived collections that automatically propagate changes
/// from their parent. Each derived view holds exactly one subscription to its
/// immediate parent; parents never hold strong references to children (the
/// subscription closure captures only a `Weak` handle), so the view graph
/// stays an acyclic ownership tree.
///
/// Propagation is synchronous and single-threaded: a mutation call walks the
/// downstream subscriber chain to completion before returning, and every view
/// updates its own state before emitting on its own channel.

use crate::book::{Book, BookId};
use crate::channel::{BookChannel, DeferGuard, ListenerId};
use crate::delta::BooksDelta;
use crate::group::GroupedView;
use crate::order::{BookOrder, ShelfOrder};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// The contract every view satisfies: enumerate current members, test
/// membership by id, fetch the latest stored value, and expose a record-delta
/// channel.
pub trait BookView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current members. Enumeration order is unspecified
    /// except for `SortedView`, which yields its maintained order.
    fn books(&self) -> Vec<Book>;

    fn contains(&self, id: &str) -> bool;

    /// The latest stored value for `id`. Panics if absent.
    fn stored(&self, id: &str) -> Book;

    fn channel(&self) -> &BookChannel;

    /// Open a deferral scope on this view's record channel.
    fn defer(&self) -> DeferGuard<'_, BooksDelta> {
        self.channel().defer()
    }
}

/// Fluent composition over any `Rc`-held view.
///
/// # Examples
///
/// ```
/// use liveshelf::{Book, BookOrder, BookView, Library, ViewCompose};
///
/// let library = Library::new();
/// library.add(vec![
///     Book::new("b1", "Banana", "A"),
///     Book::new("b2", "Apple", "B"),
/// ]);
///
/// let sorted = library.sorted(BookOrder::Title);
/// let titles: Vec<String> = sorted.books().into_iter().map(|b| b.title).collect();
/// assert_eq!(titles, vec!["Apple", "Banana"]);
/// ```
pub trait ViewCompose {
    fn filtered(&self, predicate: impl Fn(&Book) -> bool + 'static) -> Rc<FilteredView>;
    fn sorted(&self, order: BookOrder) -> Rc<SortedView>;
    fn grouped_by(
        &self,
        key_fn: impl Fn(&Book) -> Vec<String> + 'static,
        order: ShelfOrder,
    ) -> Rc<GroupedView>;
}

impl<V: BookView + 'static> ViewCompose for Rc<V> {
    fn filtered(&self, predicate: impl Fn(&Book) -> bool + 'static) -> Rc<FilteredView> {
        FilteredView::new(self.clone(), predicate)
    }

    fn sorted(&self, order: BookOrder) -> Rc<SortedView> {
        SortedView::new(self.clone(), order)
    }

    fn grouped_by(
        &self,
        key_fn: impl Fn(&Book) -> Vec<String> + 'static,
        order: ShelfOrder,
    ) -> Rc<GroupedView> {
        GroupedView::new(self.clone(), key_fn, order)
    }
}

/// Subscribe `child` to `parent`'s record channel through a weak handle,
/// returning the subscription token.
pub(crate) fn subscribe_weak<V, F>(parent: &Rc<dyn BookView>, child: &Rc<V>, apply: F) -> ListenerId
where
    V: 'static,
    F: Fn(&V, &BooksDelta) + 'static,
{
    let weak = Rc::downgrade(child);
    parent.channel().subscribe(move |delta| {
        if let Some(view) = weak.upgrade() {
            apply(&view, delta);
        }
    })
}

/// A predicate-restricted subset of a parent view.
///
/// Stateless: membership is always derived from the parent's current contents
/// plus the predicate, so incoming deltas are re-partitioned by current
/// predicate truth alone. A modification that flips the predicate is
/// indistinguishable from a true add or remove, which is why downstream
/// receivers apply `modified` of an unknown id as an add and ignore `removed`
/// of an unknown id.
pub struct FilteredView {
    parent: Rc<dyn BookView>,
    predicate: Box<dyn Fn(&Book) -> bool>,
    channel: BookChannel,
    upstream: Cell<Option<ListenerId>>,
}

impl FilteredView {
    pub fn new<V, F>(parent: Rc<V>, predicate: F) -> Rc<Self>
    where
        V: BookView + 'static,
        F: Fn(&Book) -> bool + 'static,
    {
        let parent: Rc<dyn BookView> = parent;
        let view = Rc::new(FilteredView {
            parent: parent.clone(),
            predicate: Box::new(predicate),
            channel: BookChannel::new(),
            upstream: Cell::new(None),
        });
        let sub = subscribe_weak(&parent, &view, FilteredView::apply_parent_delta);
        view.upstream.set(Some(sub));
        view
    }

    /// Drop the upstream subscription. Propagation stops permanently; there
    /// is no re-attach.
    pub fn detach(&self) {
        if let Some(id) = self.upstream.take() {
            self.parent.channel().unsubscribe(id);
        }
    }

    fn apply_parent_delta(&self, delta: &BooksDelta) {
        match delta {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                let passing = |b: &&Book| (self.predicate)(b);
                let added: Vec<Book> = added.iter().filter(passing).cloned().collect();

                let mut kept = Vec::new();
                let mut dropped = Vec::new();
                for book in modified {
                    if (self.predicate)(book) {
                        kept.push(book.clone());
                    } else {
                        // Current truth says "not a member"; receivers that
                        // never held it will ignore the removal.
                        dropped.push(book.clone());
                    }
                }

                let mut removed: Vec<Book> = removed.iter().filter(passing).cloned().collect();
                removed.extend(dropped);

                self.channel.emit(BooksDelta::changed(added, kept, removed));
            }
            BooksDelta::ThumbnailsChanged { touched } => {
                let touched: Vec<BookId> = touched
                    .iter()
                    .filter(|id| self.contains(id))
                    .cloned()
                    .collect();
                self.channel.emit(BooksDelta::ThumbnailsChanged { touched });
            }
            BooksDelta::Refresh => self.channel.emit(BooksDelta::Refresh),
        }
    }
}

impl BookView for FilteredView {
    fn len(&self) -> usize {
        self.parent
            .books()
            .iter()
            .filter(|b| (self.predicate)(b))
            .count()
    }

    fn books(&self) -> Vec<Book> {
        self.parent
            .books()
            .into_iter()
            .filter(|b| (self.predicate)(b))
            .collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.parent.contains(id) && (self.predicate)(&self.parent.stored(id))
    }

    fn stored(&self, id: &str) -> Book {
        let book = self.parent.stored(id);
        if !(self.predicate)(&book) {
            panic!("book '{id}' not in filtered view");
        }
        book
    }

    fn channel(&self) -> &BookChannel {
        &self.channel
    }
}

#[derive(Default)]
struct SortedState {
    /// Totally ordered per the active selector at all observable times
    /// (arbitrary order under `Random`).
    seq: Vec<Book>,
    /// Maps each id to its latest stored value; also supplies the old sort
    /// key when a
    /// modified book has to be located in `seq`.
    index: HashMap<BookId, Book>,
}

/// A totally ordered sequence over a parent view's records, maintained
/// incrementally under a dynamic comparator selector.
///
/// Non-random insertion and removal are binary searches; the comparator's
/// tie-break chain ends on the book id, so the search is well-defined even
/// with duplicate primary keys. Under `Random`, new books are inserted at a
/// uniformly random index in `[0, len]` drawn from an injected RNG; this is
/// an O(1) approximation of randomness, not an unbiased permutation over the
/// view's history.
///
/// # Examples
///
/// ```
/// use liveshelf::{Book, BookOrder, BookView, Library, ViewCompose};
///
/// let library = Library::new();
/// library.add(vec![Book::new("b1", "Banana", "A")]);
///
/// let sorted = library.sorted(BookOrder::Title);
/// library.add(vec![Book::new("b2", "Apple", "B")]);
///
/// assert_eq!(sorted.at(0).title, "Apple");
/// assert_eq!(sorted.at(1).title, "Banana");
/// ```
pub struct SortedView {
    parent: Rc<dyn BookView>,
    order: Cell<BookOrder>,
    state: RefCell<SortedState>,
    rng: RefCell<SmallRng>,
    channel: BookChannel,
    upstream: Cell<Option<ListenerId>>,
}

impl SortedView {
    pub fn new<V: BookView + 'static>(parent: Rc<V>, order: BookOrder) -> Rc<Self> {
        Self::construct(parent, order, SmallRng::from_entropy())
    }

    /// Deterministic construction for tests and reproducible sessions; only
    /// `Random` order consults the RNG.
    pub fn with_seed<V: BookView + 'static>(
        parent: Rc<V>,
        order: BookOrder,
        seed: u64,
    ) -> Rc<Self> {
        Self::construct(parent, order, SmallRng::seed_from_u64(seed))
    }

    fn construct<V: BookView + 'static>(parent: Rc<V>, order: BookOrder, rng: SmallRng) -> Rc<Self> {
        let parent: Rc<dyn BookView> = parent;
        let books = parent.books();
        Self::wire(parent, order, books, rng)
    }

    /// Build a view around `books` and subscribe it to `parent`.
    fn wire(
        parent: Rc<dyn BookView>,
        order: BookOrder,
        books: Vec<Book>,
        rng: SmallRng,
    ) -> Rc<Self> {
        let view = Rc::new(SortedView {
            parent: parent.clone(),
            order: Cell::new(order),
            state: RefCell::new(SortedState::default()),
            rng: RefCell::new(rng),
            channel: BookChannel::new(),
            upstream: Cell::new(None),
        });
        view.rebuild_from(books);
        let sub = subscribe_weak(&parent, &view, SortedView::apply_parent_delta);
        view.upstream.set(Some(sub));
        view
    }

    pub fn order(&self) -> BookOrder {
        self.order.get()
    }

    /// The book at `index` in the maintained order. Panics if out of range.
    pub fn at(&self, index: usize) -> Book {
        let state = self.state.borrow();
        state
            .seq
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("index {} out of range [0, {})", index, state.seq.len()))
    }

    /// Current position of `id` in the maintained order, if present.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.state.borrow().seq.iter().position(|b| b.id == id)
    }

    /// Re-sort the sequence in place under a new selector. Consumers receive
    /// `Refresh`: everything may have moved.
    pub fn sort(&self, order: BookOrder) {
        self.order.set(order);
        {
            let mut state = self.state.borrow_mut();
            if order.is_random() {
                state.seq.shuffle(&mut *self.rng.borrow_mut());
            } else {
                state.seq.sort_by(|a, b| order.compare(a, b));
            }
        }
        log::debug!("sorted view: re-sorted in place under {order:?}");
        self.channel.emit(BooksDelta::Refresh);
    }

    /// Constructing re-sort: with the same selector this is a no-op returning
    /// the same view; otherwise the current sequence is cloned, sorted once
    /// under the new selector, and wired to the same parent independently.
    pub fn resort(self: Rc<Self>, order: BookOrder) -> Rc<SortedView> {
        if order == self.order.get() {
            return self;
        }
        let seq = self.state.borrow().seq.clone();
        Self::wire(self.parent.clone(), order, seq, SmallRng::from_entropy())
    }

    /// Drop the upstream subscription permanently.
    pub fn detach(&self) {
        if let Some(id) = self.upstream.take() {
            self.parent.channel().unsubscribe(id);
        }
    }

    fn rebuild_from(&self, mut books: Vec<Book>) {
        let order = self.order.get();
        if order.is_random() {
            books.shuffle(&mut *self.rng.borrow_mut());
        } else {
            books.sort_by(|a, b| order.compare(a, b));
        }
        let index = books.iter().map(|b| (b.id.clone(), b.clone())).collect();
        *self.state.borrow_mut() = SortedState { seq: books, index };
    }

    /// Insert into both the sequence and the id index.
    fn seq_insert(&self, state: &mut SortedState, book: Book) {
        let order = self.order.get();
        let pos = if order.is_random() {
            self.rng.borrow_mut().gen_range(0..=state.seq.len())
        } else {
            match state
                .seq
                .binary_search_by(|probe| order.compare(probe, &book))
            {
                Ok(_) => panic!("book '{}' already present in sorted view", book.id),
                Err(pos) => pos,
            }
        };
        state.seq.insert(pos, book.clone());
        state.index.insert(book.id.clone(), book);
    }

    /// Remove `old` from the sequence. The caller has already taken `old`
    /// out of the id index; its attribute values supply the sort key the
    /// sequence filed it under.
    fn seq_remove(&self, state: &mut SortedState, old: &Book) {
        let order = self.order.get();
        let pos = if order.is_random() {
            state
                .seq
                .iter()
                .position(|b| b.id == old.id)
                .unwrap_or_else(|| panic!("book '{}' missing from sorted sequence", old.id))
        } else {
            match state.seq.binary_search_by(|probe| order.compare(probe, old)) {
                Ok(pos) => pos,
                Err(_) => panic!("book '{}' missing from sorted sequence", old.id),
            }
        };
        assert_eq!(
            state.seq[pos].id, old.id,
            "sorted sequence out of order: binary search for '{}' landed on '{}'",
            old.id, state.seq[pos].id,
        );
        state.seq.remove(pos);
    }

    fn apply_parent_delta(&self, delta: &BooksDelta) {
        match delta {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                let mut out_added = Vec::new();
                let mut out_modified = Vec::new();
                let mut out_removed = Vec::new();
                {
                    let mut state = self.state.borrow_mut();

                    for book in removed {
                        if let Some(old) = state.index.remove(&book.id) {
                            self.seq_remove(&mut state, &old);
                            out_removed.push(old);
                        }
                    }
                    for book in modified {
                        if let Some(old) = state.index.remove(&book.id) {
                            self.seq_remove(&mut state, &old);
                            self.seq_insert(&mut state, book.clone());
                            out_modified.push(book.clone());
                        } else {
                            // An upstream filter re-partitions by current
                            // truth; first sight of this id is an add here.
                            self.seq_insert(&mut state, book.clone());
                            out_added.push(book.clone());
                        }
                    }
                    for book in added {
                        if state.index.contains_key(&book.id) {
                            panic!("book '{}' already present in sorted view", book.id);
                        }
                        self.seq_insert(&mut state, book.clone());
                        out_added.push(book.clone());
                    }
                }
                self.channel
                    .emit(BooksDelta::changed(out_added, out_modified, out_removed));
            }
            BooksDelta::ThumbnailsChanged { touched } => {
                let touched: Vec<BookId> = {
                    let state = self.state.borrow();
                    touched
                        .iter()
                        .filter(|id| state.index.contains_key(*id))
                        .cloned()
                        .collect()
                };
                self.channel.emit(BooksDelta::ThumbnailsChanged { touched });
            }
            BooksDelta::Refresh => {
                self.rebuild_from(self.parent.books());
                log::debug!("sorted view: rebuilt from parent after refresh");
                self.channel.emit(BooksDelta::Refresh);
            }
        }
    }
}

impl BookView for SortedView {
    fn len(&self) -> usize {
        self.state.borrow().seq.len()
    }

    fn books(&self) -> Vec<Book> {
        self.state.borrow().seq.clone()
    }

    fn contains(&self, id: &str) -> bool {
        self.state.borrow().index.contains_key(id)
    }

    fn stored(&self, id: &str) -> Book {
        self.state
            .borrow()
            .index
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("book '{id}' not found in sorted view"))
    }

    fn channel(&self) -> &BookChannel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    fn book(id: &str, title: &str, author: &str) -> Book {
        Book::new(id, title, author)
    }

    fn titles(view: &dyn BookView) -> Vec<String> {
        view.books().into_iter().map(|b| b.title).collect()
    }

    fn record_deltas(view: &dyn BookView) -> Rc<RefCell<Vec<BooksDelta>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        view.channel()
            .subscribe(move |delta: &BooksDelta| s.borrow_mut().push(delta.clone()));
        seen
    }

    // === FilteredView ===

    #[test]
    fn test_filter_membership_matches_predicate() {
        let library = Library::new();
        library.add(vec![
            book("a", "Dune", "Herbert"),
            book("b", "Solaris", "Lem"),
            book("c", "Fiasco", "Lem"),
        ]);

        let lem = library.filtered(|b| b.author == "Lem");
        assert_eq!(lem.len(), 2);
        assert!(lem.contains("b"));
        assert!(!lem.contains("a"));
        assert_eq!(lem.stored("c").title, "Fiasco");
    }

    #[test]
    fn test_filter_reports_add_of_matching_book() {
        let library = Library::new();
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        library.add(vec![
            book("a", "Dune", "Herbert"),
            book("b", "Solaris", "Lem"),
        ]);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            BooksDelta::Changed { added, .. } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].id, "b");
            }
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_nonmatching_delta_is_silent() {
        let library = Library::new();
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        library.add(vec![book("a", "Dune", "Herbert")]);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_filter_modification_flipping_predicate_becomes_remove() {
        let library = Library::new();
        library.add(vec![book("a", "Solaris", "Lem")]);
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        library.replace(vec![book("a", "Solaris", "Tarkovsky")]);

        assert_eq!(lem.len(), 0);
        match &seen.borrow()[0] {
            BooksDelta::Changed { removed, .. } => {
                assert_eq!(removed.len(), 1);
                assert_eq!(removed[0].id, "a");
            }
            other => panic!("expected Changed, got {other:?}"),
        };
    }

    #[test]
    fn test_deferred_predicate_flip_off_then_on_nets_to_modify() {
        let library = Library::new();
        library.add(vec![book("a", "Solaris", "Lem")]);
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        // The first flip arrives downstream as a remove, the second as a
        // modify of an id the pending delta holds as removed.
        {
            let _guard = lem.defer();
            library.replace(vec![book("a", "Solaris", "Other")]);
            library.replace(vec![book("a", "Solaris", "Lem")]);
        }

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                assert!(added.is_empty());
                assert_eq!(modified.len(), 1);
                assert_eq!(modified[0].id, "a");
                assert_eq!(modified[0].author, "Lem");
                assert!(removed.is_empty(), "net delta must be disjoint by id");
            }
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_forwards_refresh_unchanged() {
        let library = Library::new();
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        library.refresh(vec![book("a", "Dune", "Herbert")]);
        assert!(matches!(seen.borrow()[0], BooksDelta::Refresh));
    }

    #[test]
    fn test_filter_forwards_only_matching_thumbnails() {
        let library = Library::new();
        library.add(vec![
            book("a", "Dune", "Herbert"),
            book("b", "Solaris", "Lem"),
        ]);
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        library.touch_covers(&["a".to_string(), "b".to_string()]);

        match &seen.borrow()[0] {
            BooksDelta::ThumbnailsChanged { touched } => {
                assert_eq!(touched, &vec!["b".to_string()]);
            }
            other => panic!("expected ThumbnailsChanged, got {other:?}"),
        };
    }

    #[test]
    fn test_detached_filter_stops_updating() {
        let library = Library::new();
        let lem = library.filtered(|b| b.author == "Lem");
        let seen = record_deltas(&*lem);

        lem.detach();
        library.add(vec![book("b", "Solaris", "Lem")]);
        assert!(seen.borrow().is_empty());
        assert_eq!(library.channel().listener_count(), 0);
    }

    // === SortedView ===

    #[test]
    fn test_sorted_insertion_keeps_order() {
        let library = Library::new();
        library.add(vec![book("a", "Banana", "X")]);
        let sorted = library.sorted(BookOrder::Title);

        library.add(vec![book("b", "Apple", "Y")]);
        assert_eq!(titles(&*sorted), vec!["Apple", "Banana"]);

        library.add(vec![book("c", "Cherry", "Z")]);
        assert_eq!(titles(&*sorted), vec!["Apple", "Banana", "Cherry"]);
    }

    #[test]
    fn test_sorted_duplicate_titles_use_tie_break() {
        let library = Library::new();
        library.add(vec![book("1", "Same", "Brown"), book("2", "Same", "Adams")]);
        let sorted = library.sorted(BookOrder::Title);

        let authors: Vec<String> = sorted.books().into_iter().map(|b| b.author).collect();
        assert_eq!(authors, vec!["Adams", "Brown"]);
    }

    #[test]
    fn test_sorted_removal_and_modification() {
        let library = Library::new();
        library.add(vec![
            book("a", "Banana", "X"),
            book("b", "Apple", "Y"),
            book("c", "Cherry", "Z"),
        ]);
        let sorted = library.sorted(BookOrder::Title);

        library.remove(&["b".to_string()]);
        assert_eq!(titles(&*sorted), vec!["Banana", "Cherry"]);

        // Renaming Cherry to Aardvark moves it to the front.
        library.replace(vec![book("c", "Aardvark", "Z")]);
        assert_eq!(titles(&*sorted), vec!["Aardvark", "Banana"]);
        assert_eq!(sorted.position("c"), Some(0));
    }

    #[test]
    fn test_sorted_emits_repartitioned_delta() {
        let library = Library::new();
        library.add(vec![book("a", "Banana", "X")]);
        let sorted = library.sorted(BookOrder::Title);
        let seen = record_deltas(&*sorted);

        library.replace(vec![book("a", "Apple", "X"), book("b", "Cherry", "Y")]);

        match &seen.borrow()[0] {
            BooksDelta::Changed {
                added, modified, ..
            } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].id, "b");
                assert_eq!(modified.len(), 1);
                assert_eq!(modified[0].id, "a");
            }
            other => panic!("expected Changed, got {other:?}"),
        };
    }

    #[test]
    fn test_sort_in_place_emits_refresh() {
        let library = Library::new();
        library.add(vec![
            book("a", "Banana", "Young").with_pages(100),
            book("b", "Apple", "Old").with_pages(900),
        ]);
        let sorted = library.sorted(BookOrder::Title);
        let seen = record_deltas(&*sorted);

        sorted.sort(BookOrder::PageCount);

        assert!(matches!(seen.borrow()[0], BooksDelta::Refresh));
        assert_eq!(titles(&*sorted), vec!["Apple", "Banana"]);
        assert_eq!(sorted.order(), BookOrder::PageCount);
    }

    #[test]
    fn test_resort_same_selector_returns_same_view() {
        let library = Library::new();
        let sorted = library.sorted(BookOrder::Title);
        let same = Rc::clone(&sorted).resort(BookOrder::Title);
        assert!(Rc::ptr_eq(&sorted, &same));
    }

    #[test]
    fn test_resort_new_selector_is_independent() {
        let library = Library::new();
        library.add(vec![
            book("a", "Banana", "Adams"),
            book("b", "Apple", "Brown"),
        ]);
        let by_title = library.sorted(BookOrder::Title);
        let by_author = Rc::clone(&by_title).resort(BookOrder::AuthorTitle);

        assert!(!Rc::ptr_eq(&by_title, &by_author));
        assert_eq!(titles(&*by_title), vec!["Apple", "Banana"]);
        assert_eq!(titles(&*by_author), vec!["Banana", "Apple"]);

        // Both track the same upstream parent independently.
        library.add(vec![book("c", "Cherry", "Able")]);
        assert_eq!(titles(&*by_title), vec!["Apple", "Banana", "Cherry"]);
        assert_eq!(titles(&*by_author), vec!["Cherry", "Banana", "Apple"]);
    }

    #[test]
    fn test_sorted_rebuilds_on_refresh() {
        let library = Library::new();
        library.add(vec![book("a", "Banana", "X")]);
        let sorted = library.sorted(BookOrder::Title);
        let seen = record_deltas(&*sorted);

        library.refresh(vec![book("b", "Apple", "Y"), book("c", "Cherry", "Z")]);

        assert!(matches!(seen.borrow()[0], BooksDelta::Refresh));
        assert_eq!(titles(&*sorted), vec!["Apple", "Cherry"]);
        assert!(!sorted.contains("a"));
    }

    #[test]
    fn test_random_order_maintains_membership() {
        let library = Library::new();
        let shuffled = SortedView::with_seed(library.clone(), BookOrder::Random, 7);

        library.add(vec![
            book("a", "A", "X"),
            book("b", "B", "X"),
            book("c", "C", "X"),
        ]);
        assert_eq!(shuffled.len(), 3);

        library.remove(&["b".to_string()]);
        assert_eq!(shuffled.len(), 2);
        assert!(shuffled.contains("a"));
        assert!(!shuffled.contains("b"));
        assert!(shuffled.contains("c"));
    }

    #[test]
    fn test_filter_then_sort_composition() {
        let library = Library::new();
        library.add(vec![
            book("a", "Zebra", "Lem"),
            book("b", "Apple", "Herbert"),
            book("c", "Mango", "Lem"),
        ]);

        let sorted_lem = library
            .filtered(|b| b.author == "Lem")
            .sorted(BookOrder::Title);
        assert_eq!(titles(&*sorted_lem), vec!["Mango", "Zebra"]);

        library.add(vec![
            book("d", "Fiasco", "Lem"),
            book("e", "Dune", "Herbert"),
        ]);
        assert_eq!(titles(&*sorted_lem), vec!["Fiasco", "Mango", "Zebra"]);

        // Author change removes it from the filtered chain entirely.
        library.replace(vec![book("c", "Mango", "Herbert")]);
        assert_eq!(titles(&*sorted_lem), vec!["Fiasco", "Zebra"]);
    }

    #[test]
    #[should_panic(expected = "not in filtered view")]
    fn test_filtered_stored_outside_predicate_panics() {
        let library = Library::new();
        library.add(vec![book("a", "Dune", "Herbert")]);
        let lem = library.filtered(|b| b.author == "Lem");
        lem.stored("a");
    }
}
