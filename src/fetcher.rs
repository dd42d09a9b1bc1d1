use crate::repository::AuthorRepository;
use crate::{Book, Cache, DataAccessError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// A trait for loading a batch of values by key from some datastore.
/// Implementing `Fetcher` lets lookups be batched and cached through a
/// [`BatchLoader`](crate::BatchLoader).
#[async_trait]
pub trait Fetcher {
    /// The lookup key, such as an author ID.
    type Key: Clone + Hash + Eq + Send + Sync;

    /// The value loaded for each key.
    type Value: Clone + Send + Sync;

    /// The error indicating that loading a batch failed.
    type Error: Display + Send + Sync + 'static;

    /// Load the values for the given keys, calling [`Cache::insert`] for each
    /// value found. Keys left without a value are marked as not found once
    /// `fetch` returns `Ok(())`.
    async fn fetch(
        &self,
        keys: &[Self::Key],
        values: &mut Cache<'_, Self::Key, Self::Value>,
    ) -> Result<(), Self::Error>;
}

/// Loads the book collections of a set of authors with a single
/// `author_id IN (...)` query. An author with no books gets an empty
/// collection.
pub struct BooksByAuthor {
    repository: AuthorRepository,
}

impl BooksByAuthor {
    pub fn new(repository: AuthorRepository) -> Self {
        BooksByAuthor { repository }
    }
}

#[async_trait]
impl Fetcher for BooksByAuthor {
    type Key = i64;
    type Value = Vec<Book>;
    type Error = DataAccessError;

    async fn fetch(
        &self,
        keys: &[i64],
        values: &mut Cache<'_, i64, Vec<Book>>,
    ) -> Result<(), DataAccessError> {
        let books = self.repository.books_for_authors(keys).await?;

        let mut by_author: HashMap<i64, Vec<Book>> =
            keys.iter().map(|author_id| (*author_id, vec![])).collect();
        for book in books {
            by_author.entry(book.author_id).or_default().push(book);
        }

        for (author_id, books) in by_author {
            values.insert(author_id, books);
        }

        Ok(())
    }
}
