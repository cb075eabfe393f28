/// Library Views Example
///
/// This example demonstrates:
/// - Populating the mutable base library
/// - Filtered, sorted, and grouped views that track it live
/// - Subscribing to record and shelf deltas
/// - Deferring notifications around a batch of mutations
/// - Aggregating derived and user-curated shelves

use liveshelf::{
    Book, BookOrder, BookView, BooksDelta, Library, Shelf, ShelfAggregate, ShelfOrder,
    ShelvesDelta, ViewCompose,
};

fn main() {
    env_logger::init();

    println!("=== LiveShelf Library Views Example ===\n");

    // 1. Populate the base library
    println!("1. Populating the library...");
    let library = Library::new();
    library.add(vec![
        Book::new("b1", "Solaris", "Stanislaw Lem")
            .with_tags(["sci-fi", "classic"])
            .with_pages(204),
        Book::new("b2", "Dune", "Frank Herbert")
            .with_tags(["sci-fi"])
            .with_pages(412),
        Book::new("b3", "Fiasco", "Stanislaw Lem")
            .with_tags(["sci-fi"])
            .with_pages(322),
        Book::new("b4", "The Cyberiad", "Stanislaw Lem")
            .with_tags(["sci-fi", "short-stories"])
            .with_pages(295),
    ]);
    println!("   Library holds {} books\n", library.len());

    // 2. Derive live views
    println!("2. Deriving views...");
    let long_reads = library.filtered(|b| b.page_count >= 250);
    let by_title = long_reads.sorted(BookOrder::Title);
    let by_author = library.grouped_by(|b| vec![b.author.clone()], ShelfOrder::Name);
    println!("   {} long reads, sorted:", by_title.len());
    for book in by_title.books() {
        println!("     {} ({} pages)", book.title, book.page_count);
    }
    println!();

    // 3. Subscribe to deltas
    println!("3. Subscribing to deltas...");
    by_title.channel().subscribe(|delta: &BooksDelta| {
        if let BooksDelta::Changed {
            added,
            modified,
            removed,
        } = delta
        {
            println!(
                "   [sorted] +{} ~{} -{}",
                added.len(),
                modified.len(),
                removed.len()
            );
        }
    });
    by_author.channel().subscribe(|delta: &ShelvesDelta| {
        if let ShelvesDelta::Changed {
            added, removed, ..
        } = delta
        {
            for name in added {
                println!("   [shelves] new shelf '{name}'");
            }
            for name in removed {
                println!("   [shelves] dropped shelf '{name}'");
            }
        }
    });

    // 4. Mutations ripple through the graph
    println!("4. Mutating the library...");
    library.add(vec![Book::new("b5", "Roadside Picnic", "Strugatsky")
        .with_tags(["sci-fi"])
        .with_pages(256)]);
    library.remove(&["b2".to_string()]);
    println!("   Long reads now: {}\n", by_title.len());

    // 5. Deferral batches notifications
    println!("5. Deferring notifications around a batch...");
    {
        let _guard = by_title.defer();
        library.add(vec![
            Book::new("b6", "Eden", "Stanislaw Lem").with_pages(262),
            Book::new("b7", "The Invincible", "Stanislaw Lem").with_pages(288),
        ]);
        library.remove(&["b6".to_string()]);
        println!("   (three mutations applied, nothing emitted yet)");
    }
    println!();

    // 6. Aggregate derived and curated shelves
    println!("6. Aggregating shelves...");
    let aggregate = ShelfAggregate::new(ShelfOrder::Size);
    for shelf in by_author.shelves().shelves() {
        aggregate.add_shelf(shelf);
    }
    let favorites = Shelf::new("favorites");
    aggregate.add_shelf(favorites.clone());
    println!("   Visible (favorites is empty): {:?}", aggregate.shelves().names());

    favorites
        .books()
        .add(vec![Book::new("b8", "Annihilation", "VanderMeer").with_pages(195)]);
    println!("   Visible after curating one book: {:?}", aggregate.shelves().names());

    println!("\n=== Example Complete ===");
}
