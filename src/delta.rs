/// Delta - Incremental Change Propagation for LiveShelf
///
/// This module defines the change descriptions that flow down the view graph,
/// allowing derived views to update incrementally rather than rebuilding from
/// scratch.
///
/// # Design Philosophy
///
/// When a view mutates, instead of downstream views doing a full rebuild,
/// they receive a delta describing what changed. Each view type re-establishes
/// its own invariant (membership, order, group existence) from the delta plus
/// its cached state.
///
/// # Delta Cases
///
/// - `Changed`: three disjoint identity-partitioned sets, relative to the
///   receiver's state before the delta
/// - `ThumbnailsChanged`: display-only refresh hint; never affects membership,
///   order, or grouping
/// - `Refresh`: total invalidation; receivers discard cached derived state and
///   rebuild by re-enumerating the sender
///
/// # Coalescing
///
/// While a notification deferral is open, consecutive deltas are folded into
/// one net delta. The identity algebra:
///
/// - add then modify  = add (new value)
/// - add then remove  = nothing
/// - modify then remove = remove
/// - remove then add  = modify
/// - remove then modify = modify
/// - anything + `Refresh` = `Refresh`

use crate::book::{Book, BookId};
use std::collections::{HashMap, HashSet};

/// A delta on the record channel of any book view.
#[derive(Debug, Clone)]
pub enum BooksDelta {
    /// Membership or attribute changes. The three sets are disjoint by id:
    /// `added` holds identities new to the sender, `modified` holds
    /// already-known identities carrying new attribute values, `removed`
    /// holds identities no longer present (carrying their last known value).
    Changed {
        added: Vec<Book>,
        modified: Vec<Book>,
        removed: Vec<Book>,
    },

    /// Cover art changed for the touched identities; membership, order and
    /// grouping are unaffected everywhere downstream.
    ThumbnailsChanged { touched: Vec<BookId> },

    /// Everything may have changed; re-enumerate the sender.
    Refresh,
}

impl BooksDelta {
    pub fn changed(added: Vec<Book>, modified: Vec<Book>, removed: Vec<Book>) -> Self {
        BooksDelta::Changed {
            added,
            modified,
            removed,
        }
    }

    pub fn added(books: Vec<Book>) -> Self {
        Self::changed(books, Vec::new(), Vec::new())
    }

    pub fn modified(books: Vec<Book>) -> Self {
        Self::changed(Vec::new(), books, Vec::new())
    }

    pub fn removed(books: Vec<Book>) -> Self {
        Self::changed(Vec::new(), Vec::new(), books)
    }
}

/// A delta on the group channel of a shelf set. Carries shelf names, not
/// records; each shelf's own record channel reports its member changes
/// independently.
#[derive(Debug, Clone)]
pub enum ShelvesDelta {
    Changed {
        added: Vec<String>,
        modified: Vec<String>,
        removed: Vec<String>,
    },
    Refresh,
}

impl ShelvesDelta {
    pub fn changed(added: Vec<String>, modified: Vec<String>, removed: Vec<String>) -> Self {
        ShelvesDelta::Changed {
            added,
            modified,
            removed,
        }
    }
}

/// Deltas that can be folded together while notifications are deferred.
pub trait Coalesce: Clone {
    /// Fold `next` into `pending`, producing the net delta.
    fn coalesce(pending: Self, next: Self) -> Self;

    /// True if dispatching this delta would be a no-op for every receiver.
    fn is_empty(&self) -> bool;
}

impl Coalesce for BooksDelta {
    fn coalesce(pending: Self, next: Self) -> Self {
        use BooksDelta::*;
        match (pending, next) {
            (Refresh, _) | (_, Refresh) => Refresh,

            (ThumbnailsChanged { touched: a }, ThumbnailsChanged { touched: b }) => {
                let mut seen: HashSet<BookId> = a.iter().cloned().collect();
                let mut touched = a;
                for id in b {
                    if seen.insert(id.clone()) {
                        touched.push(id);
                    }
                }
                ThumbnailsChanged { touched }
            }

            (
                Changed {
                    added,
                    modified,
                    removed,
                },
                Changed {
                    added: next_added,
                    modified: next_modified,
                    removed: next_removed,
                },
            ) => merge_changed(
                added,
                modified,
                removed,
                next_added,
                next_modified,
                next_removed,
            ),

            // Thumbnail touches carry no attribute values, so they cannot be
            // folded into a Changed set; escalate to a full refresh.
            (Changed { .. }, ThumbnailsChanged { .. })
            | (ThumbnailsChanged { .. }, Changed { .. }) => Refresh,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => added.is_empty() && modified.is_empty() && removed.is_empty(),
            BooksDelta::ThumbnailsChanged { touched } => touched.is_empty(),
            BooksDelta::Refresh => false,
        }
    }
}

/// Fold a second `Changed` delta into an accumulated one, keeping the three
/// sets disjoint by identity.
fn merge_changed(
    added: Vec<Book>,
    modified: Vec<Book>,
    removed: Vec<Book>,
    next_added: Vec<Book>,
    next_modified: Vec<Book>,
    next_removed: Vec<Book>,
) -> BooksDelta {
    let mut add: HashMap<BookId, Book> = added.into_iter().map(|b| (b.id.clone(), b)).collect();
    let mut modify: HashMap<BookId, Book> =
        modified.into_iter().map(|b| (b.id.clone(), b)).collect();
    let mut remove: HashMap<BookId, Book> =
        removed.into_iter().map(|b| (b.id.clone(), b)).collect();

    for book in next_added {
        if remove.remove(&book.id).is_some() {
            // Removed then re-added within one deferral: net modification.
            modify.insert(book.id.clone(), book);
        } else {
            add.insert(book.id.clone(), book);
        }
    }

    for book in next_modified {
        if add.contains_key(&book.id) {
            // Still unseen by receivers; keep it an add with the newest value.
            add.insert(book.id.clone(), book);
        } else {
            // Removed then modified within one deferral (a filter predicate
            // flipping off and back on arrives this way): net modification.
            // The three sets stay disjoint by id.
            remove.remove(&book.id);
            modify.insert(book.id.clone(), book);
        }
    }

    for book in next_removed {
        if add.remove(&book.id).is_some() {
            // Added then removed within one deferral: receivers never see it.
            continue;
        }
        modify.remove(&book.id);
        remove.insert(book.id.clone(), book);
    }

    BooksDelta::Changed {
        added: add.into_values().collect(),
        modified: modify.into_values().collect(),
        removed: remove.into_values().collect(),
    }
}

impl Coalesce for ShelvesDelta {
    fn coalesce(pending: Self, next: Self) -> Self {
        use ShelvesDelta::*;
        match (pending, next) {
            (Refresh, _) | (_, Refresh) => Refresh,
            (
                Changed {
                    added,
                    modified,
                    removed,
                },
                Changed {
                    added: next_added,
                    modified: next_modified,
                    removed: next_removed,
                },
            ) => {
                let mut add: HashSet<String> = added.into_iter().collect();
                let mut modify: HashSet<String> = modified.into_iter().collect();
                let mut remove: HashSet<String> = removed.into_iter().collect();

                for name in next_added {
                    if remove.remove(&name) {
                        modify.insert(name);
                    } else {
                        add.insert(name);
                    }
                }
                for name in next_modified {
                    if !add.contains(&name) {
                        remove.remove(&name);
                        modify.insert(name);
                    }
                }
                for name in next_removed {
                    if add.remove(&name) {
                        continue;
                    }
                    modify.remove(&name);
                    remove.insert(name);
                }

                Changed {
                    added: add.into_iter().collect(),
                    modified: modify.into_iter().collect(),
                    removed: remove.into_iter().collect(),
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ShelvesDelta::Changed {
                added,
                modified,
                removed,
            } => added.is_empty() && modified.is_empty() && removed.is_empty(),
            ShelvesDelta::Refresh => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Book;

    fn book(id: &str) -> Book {
        Book::new(id, format!("title-{id}"), "author")
    }

    fn sets(delta: &BooksDelta) -> (Vec<String>, Vec<String>, Vec<String>) {
        match delta {
            BooksDelta::Changed {
                added,
                modified,
                removed,
            } => {
                let mut a: Vec<String> = added.iter().map(|b| b.id.clone()).collect();
                let mut m: Vec<String> = modified.iter().map(|b| b.id.clone()).collect();
                let mut r: Vec<String> = removed.iter().map(|b| b.id.clone()).collect();
                a.sort();
                m.sort();
                r.sort();
                (a, m, r)
            }
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_add_then_modify_stays_add() {
        let net = BooksDelta::coalesce(
            BooksDelta::added(vec![book("a")]),
            BooksDelta::modified(vec![book("a")]),
        );
        assert_eq!(sets(&net), (vec!["a".to_string()], vec![], vec![]));
    }

    #[test]
    fn test_add_then_remove_cancels() {
        let net = BooksDelta::coalesce(
            BooksDelta::added(vec![book("a")]),
            BooksDelta::removed(vec![book("a")]),
        );
        assert!(net.is_empty());
    }

    #[test]
    fn test_modify_then_remove_is_remove() {
        let net = BooksDelta::coalesce(
            BooksDelta::modified(vec![book("a")]),
            BooksDelta::removed(vec![book("a")]),
        );
        assert_eq!(sets(&net), (vec![], vec![], vec!["a".to_string()]));
    }

    #[test]
    fn test_remove_then_add_is_modify() {
        let net = BooksDelta::coalesce(
            BooksDelta::removed(vec![book("a")]),
            BooksDelta::added(vec![book("a")]),
        );
        assert_eq!(sets(&net), (vec![], vec!["a".to_string()], vec![]));
    }

    #[test]
    fn test_remove_then_modify_is_modify() {
        let mut updated = book("a");
        updated.title = "renamed".into();
        let net = BooksDelta::coalesce(
            BooksDelta::removed(vec![book("a")]),
            BooksDelta::modified(vec![updated]),
        );
        // The id must land in exactly one set, carrying the newest value.
        assert_eq!(sets(&net), (vec![], vec!["a".to_string()], vec![]));
        match &net {
            BooksDelta::Changed { modified, .. } => assert_eq!(modified[0].title, "renamed"),
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_refresh_wins() {
        let net = BooksDelta::coalesce(BooksDelta::added(vec![book("a")]), BooksDelta::Refresh);
        assert!(matches!(net, BooksDelta::Refresh));

        let net = BooksDelta::coalesce(BooksDelta::Refresh, BooksDelta::removed(vec![book("a")]));
        assert!(matches!(net, BooksDelta::Refresh));
    }

    #[test]
    fn test_thumbnails_union_dedupes() {
        let net = BooksDelta::coalesce(
            BooksDelta::ThumbnailsChanged {
                touched: vec!["a".into(), "b".into()],
            },
            BooksDelta::ThumbnailsChanged {
                touched: vec!["b".into(), "c".into()],
            },
        );
        match net {
            BooksDelta::ThumbnailsChanged { touched } => {
                assert_eq!(touched, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
            }
            other => panic!("expected ThumbnailsChanged, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_kinds_escalate_to_refresh() {
        let net = BooksDelta::coalesce(
            BooksDelta::added(vec![book("a")]),
            BooksDelta::ThumbnailsChanged {
                touched: vec!["b".into()],
            },
        );
        assert!(matches!(net, BooksDelta::Refresh));
    }

    #[test]
    fn test_independent_ids_accumulate() {
        let net = BooksDelta::coalesce(
            BooksDelta::added(vec![book("a")]),
            BooksDelta::changed(vec![book("b")], vec![book("c")], vec![book("d")]),
        );
        assert_eq!(
            sets(&net),
            (
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
                vec!["d".to_string()]
            )
        );
    }

    #[test]
    fn test_shelves_remove_then_add_is_modify() {
        let net = ShelvesDelta::coalesce(
            ShelvesDelta::changed(vec![], vec![], vec!["x".into()]),
            ShelvesDelta::changed(vec!["x".into()], vec![], vec![]),
        );
        match net {
            ShelvesDelta::Changed {
                added,
                modified,
                removed,
            } => {
                assert!(added.is_empty());
                assert_eq!(modified, vec!["x".to_string()]);
                assert!(removed.is_empty());
            }
            ShelvesDelta::Refresh => panic!("expected Changed"),
        }
    }

    #[test]
    fn test_shelves_remove_then_modify_is_modify() {
        let net = ShelvesDelta::coalesce(
            ShelvesDelta::changed(vec![], vec![], vec!["x".into()]),
            ShelvesDelta::changed(vec![], vec!["x".into()], vec![]),
        );
        match net {
            ShelvesDelta::Changed {
                added,
                modified,
                removed,
            } => {
                assert!(added.is_empty());
                assert_eq!(modified, vec!["x".to_string()]);
                assert!(removed.is_empty());
            }
            ShelvesDelta::Refresh => panic!("expected Changed"),
        }
    }

    #[test]
    fn test_shelves_add_then_remove_cancels() {
        let net = ShelvesDelta::coalesce(
            ShelvesDelta::changed(vec!["x".into()], vec![], vec![]),
            ShelvesDelta::changed(vec![], vec![], vec!["x".into()]),
        );
        assert!(net.is_empty());
    }
}
