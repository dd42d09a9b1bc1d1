//! Loads authors and their books with different fetch strategies and reports
//! how long each took and how many SQL statements it issued.
//!
//! Book collections are either loaded eagerly by the query or left pending and
//! loaded through a [`Session`], whose [`BatchLoader`] issues one query per
//! author or one per batch of authors depending on the [`FetchPolicy`].
//! [`Comparator::run`] drives one strategy end to end.

pub(crate) mod batch_loader;
pub(crate) mod cache;
pub mod comparator;
pub mod config;
pub(crate) mod error;
pub mod fetcher;
pub mod http;
pub(crate) mod model;
pub mod repository;
pub mod schema;
pub mod seed;
pub(crate) mod session;
pub mod telemetry;

pub use batch_loader::{BatchLoader, BatchLoaderBuilder};
pub use cache::Cache;
pub use comparator::{Comparator, Comparison, Strategy, TimingReport};
pub use error::{DataAccessError, LoadError};
pub use fetcher::{BooksByAuthor, Fetcher};
pub use model::{Author, Book, BookCollection};
pub use repository::{AuthorRepository, Prefetch, QueryCounter};
pub use session::{FetchPolicy, Session};
