use chrono::NaiveDate;

/// Error indicating that loading one or more book collections from a
/// [`BatchLoader`](crate::BatchLoader) failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The [`Fetcher`](crate::Fetcher) returned an error while loading the
    /// batch. The message contains the error message specified by
    /// [`Fetcher::Error`](crate::Fetcher::Error). Nothing is cached, so a
    /// later load of the same keys will try again.
    #[error("error while fetching from batch: {}", _0)]
    FetchError(String),

    /// The [`Fetcher`](crate::Fetcher) did not return a value for one or more
    /// keys in the batch.
    #[error("value not found")]
    NotFound,
}

/// Error returned by the data access layer and everything built on it.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to materialize books: {0}")]
    Load(#[from] LoadError),

    #[error("date {days} days before {today} is out of range")]
    DateOutOfRange { today: NaiveDate, days: i64 },
}
