/// LiveShelf - Live Composable Views over an In-Memory Book Collection
///
/// One mutable `Library` holds the canonical mapping from id to book;
/// filtered, sorted, and grouped views derive from it (and from each other)
/// and stay
/// current by consuming record deltas instead of rebuilding. Everything is
/// single-threaded and synchronous: a mutation call walks the whole
/// downstream view graph before it returns, and every view is
/// self-consistent at the moment its listeners run.

pub mod book;
pub mod channel;
pub mod delta;
pub mod group;
pub mod library;
pub mod order;
pub mod shelf;
pub mod view;

pub use book::{Book, BookId};
pub use channel::{BookChannel, Channel, DeferGuard, ListenerId, ShelfChannel};
pub use delta::{BooksDelta, Coalesce, ShelvesDelta};
pub use group::GroupedView;
pub use library::Library;
pub use order::{BookOrder, ShelfOrder};
pub use shelf::{Shelf, ShelfAggregate, ShelfSet};
pub use view::{BookView, FilteredView, SortedView, ViewCompose};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn book(id: &str, title: &str, author: &str) -> Book {
        Book::new(id, title, author)
    }

    #[test]
    fn test_complete_pipeline() {
        // Library -> filter -> sort, with a grouping hanging off the filter.
        let library = Library::new();
        library.add(vec![
            book("a", "Solaris", "Lem").with_pages(204),
            book("b", "Dune", "Herbert").with_pages(412),
            book("c", "Fiasco", "Lem").with_pages(322),
            book("d", "Pamphlet", "Lem").with_pages(48),
        ]);

        let long_books = library.filtered(|b| b.page_count >= 100);
        let by_title = long_books.sorted(BookOrder::Title);
        let by_author = long_books.grouped_by(|b| vec![b.author.clone()], ShelfOrder::Name);

        let titles: Vec<String> = by_title.books().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["Dune", "Fiasco", "Solaris"]);
        assert_eq!(by_author.shelves().names(), vec!["Herbert", "Lem"]);

        // A page-count edit moves "Pamphlet" into the filtered chain.
        library.replace(vec![book("d", "Pamphlet", "Lem").with_pages(150)]);
        assert_eq!(by_title.position("d"), Some(2));
        assert_eq!(by_author.shelves().get("Lem").unwrap().len(), 3);

        // And removal ripples through every derived view.
        library.remove(&["b".to_string()]);
        assert!(!by_title.contains("b"));
        assert!(!by_author.shelves().contains("Herbert"));
    }

    #[test]
    fn test_deferred_batch_reaches_consumers_once() {
        let library = Library::new();
        let sorted = library.sorted(BookOrder::Title);

        let notifications = Rc::new(RefCell::new(Vec::new()));
        let n = notifications.clone();
        sorted
            .channel()
            .subscribe(move |delta: &BooksDelta| n.borrow_mut().push(delta.clone()));

        {
            let _guard = sorted.defer();
            library.add(vec![book("a", "Solaris", "Lem")]);
            library.add(vec![book("b", "Dune", "Herbert")]);
            library.remove(&["a".to_string()]);
            // The view itself keeps up while its outbound channel is quiet.
            assert_eq!(sorted.len(), 1);
            assert!(notifications.borrow().is_empty());
        }

        let notifications = notifications.borrow();
        assert_eq!(notifications.len(), 1);
        match &notifications[0] {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                assert_eq!(added.len(), 1);
                assert_eq!(added[0].id, "b");
                assert!(modified.is_empty());
                assert!(removed.is_empty(), "a was added and removed in-scope");
            }
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_over_grouped_and_curated_shelves() {
        let library = Library::new();
        library.add(vec![
            book("a", "Solaris", "Lem"),
            book("b", "Dune", "Herbert"),
        ]);
        let by_author = library.grouped_by(|b| vec![b.author.clone()], ShelfOrder::Name);

        // Mix machine-derived shelves with a user-curated one.
        let aggregate = ShelfAggregate::new(ShelfOrder::Name);
        for shelf in by_author.shelves().shelves() {
            aggregate.add_shelf(shelf);
        }
        let reading = Shelf::new("reading list");
        aggregate.add_shelf(reading.clone());

        assert_eq!(aggregate.shelves().names(), vec!["Herbert", "Lem"]);

        reading.books().add(vec![book("x", "Roadside Picnic", "Strugatsky")]);
        assert_eq!(
            aggregate.shelves().names(),
            vec!["Herbert", "Lem", "reading list"]
        );

        reading.books().remove(&["x".to_string()]);
        assert_eq!(aggregate.shelves().names(), vec!["Herbert", "Lem"]);
    }

    #[test]
    fn test_books_round_trip_through_json() {
        let original = book("a", "Solaris", "Lem")
            .with_tags(["sci-fi"])
            .with_pages(204)
            .with_added_at(1_700_000_000);

        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: Book = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, original);

        // Loading a serialized batch into a fresh library.
        let library = Library::new();
        let batch: Vec<Book> = serde_json::from_str(&format!("[{encoded}]")).unwrap();
        library.add(batch);
        assert_eq!(library.stored("a").title, "Solaris");
    }

    #[test]
    fn test_refresh_cascades_through_chain() {
        let library = Library::new();
        library.add(vec![book("a", "Solaris", "Lem")]);
        let chain = library
            .filtered(|b| b.author == "Lem")
            .sorted(BookOrder::Title);
        assert_eq!(chain.len(), 1);

        library.refresh(vec![
            book("b", "Fiasco", "Lem"),
            book("c", "Dune", "Herbert"),
        ]);

        let titles: Vec<String> = chain.books().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["Fiasco"]);
    }

    #[test]
    fn test_dropped_view_detaches_from_parent() {
        let library = Library::new();
        {
            let sorted = library.sorted(BookOrder::Title);
            sorted.detach();
        }
        library.add(vec![book("a", "Solaris", "Lem")]);
        assert_eq!(library.channel().listener_count(), 0);
    }
}
