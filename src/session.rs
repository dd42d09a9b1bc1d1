use crate::fetcher::BooksByAuthor;
use crate::repository::AuthorRepository;
use crate::{Author, Book, BatchLoader, BookCollection, DataAccessError};

/// How pending book collections are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// One query per author on first access.
    PerAuthor,
    /// Up to `n` pending collections per query, like an ORM batch-size hint.
    Batched(usize),
}

impl FetchPolicy {
    pub fn batch_size(self) -> usize {
        match self {
            FetchPolicy::PerAuthor => 1,
            FetchPolicy::Batched(size) => size.max(1),
        }
    }
}

/// The unit of work for one comparison run: a repository plus the loader
/// that owns every book collection materialized during the run.
pub struct Session {
    repository: AuthorRepository,
    loader: BatchLoader<BooksByAuthor>,
    policy: FetchPolicy,
}

impl Session {
    pub fn new(repository: AuthorRepository, policy: FetchPolicy) -> Self {
        let loader = BatchLoader::build(BooksByAuthor::new(repository.clone()))
            .batch_size(policy.batch_size())
            .label(match policy {
                FetchPolicy::PerAuthor => "books-per-author",
                FetchPolicy::Batched(_) => "books-batched",
            })
            .finish();

        Session {
            repository,
            loader,
            policy,
        }
    }

    pub fn repository(&self) -> &AuthorRepository {
        &self.repository
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Make the session aware of the pending collections of `authors`, so
    /// that a batched load can pick them up.
    pub fn attach(&self, authors: &[Author]) {
        let pending: Vec<i64> = authors
            .iter()
            .filter(|author| !author.books.is_loaded())
            .map(|author| author.id)
            .collect();
        self.loader.register(&pending);
    }

    /// Return the author's books, loading them first if the collection is
    /// still pending. A pending collection is replaced by the loaded one.
    pub async fn materialize<'a>(&self, author: &'a mut Author) -> Result<&'a [Book], DataAccessError> {
        if !author.books.is_loaded() {
            let books = self.loader.load(author.id).await?;
            author.books = BookCollection::Loaded(books);
        }
        Ok(author.books.as_slice())
    }

    /// Number of collections this session has loaded lazily.
    pub fn num_loaded(&self) -> usize {
        self.loader.num_loaded()
    }
}
