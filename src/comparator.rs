//! Runs one fetch strategy end to end and times it.
//!
//! A run has two phases. The query phase issues the strategy's data access
//! call. The materialization phase then reads the size of every author's book
//! collection; for strategies that leave collections pending this is where the
//! extra per-author queries happen.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::repository::AuthorRepository;
use crate::{Author, DataAccessError, FetchPolicy, Session};

/// Chunk size for [`Strategy::IdListJoinedBatched`].
pub const BATCH_SIZE: usize = 100;

/// Default batch size for lazily loaded collections under
/// [`Strategy::IdListBatchSize`].
pub const DEFAULT_LAZY_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// All authors, books loaded lazily one author at a time.
    Naive,
    /// All authors with books, one inner join.
    JoinFetch,
    /// All authors with their books, through a prefetch declaration.
    PrefetchGraph,
    /// All authors, one left join.
    LeftJoin,
    /// Authors `1..=count`, books loaded lazily one author at a time.
    IdListNaive,
    /// Authors `1..=count` with books, one inner join.
    IdListJoined,
    /// Authors `1..=count`, books loaded lazily in batches.
    IdListBatchSize,
    /// Authors `1..=count` with books, one inner join per chunk of
    /// [`BATCH_SIZE`] IDs.
    IdListJoinedBatched,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Naive,
        Strategy::JoinFetch,
        Strategy::PrefetchGraph,
        Strategy::LeftJoin,
        Strategy::IdListNaive,
        Strategy::IdListJoined,
        Strategy::IdListBatchSize,
        Strategy::IdListJoinedBatched,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Naive => "naive",
            Strategy::JoinFetch => "join-fetch",
            Strategy::PrefetchGraph => "prefetch-graph",
            Strategy::LeftJoin => "left-join",
            Strategy::IdListNaive => "id-list-naive",
            Strategy::IdListJoined => "id-list-joined",
            Strategy::IdListBatchSize => "id-list-batch-size",
            Strategy::IdListJoinedBatched => "id-list-joined-batched",
        }
    }

    /// Whether the strategy works on the ID list `1..=count`.
    pub fn uses_id_list(self) -> bool {
        matches!(
            self,
            Strategy::IdListNaive
                | Strategy::IdListJoined
                | Strategy::IdListBatchSize
                | Strategy::IdListJoinedBatched
        )
    }

    fn fetch_policy(self, lazy_batch_size: usize) -> FetchPolicy {
        match self {
            Strategy::IdListBatchSize => FetchPolicy::Batched(lazy_batch_size),
            _ => FetchPolicy::PerAuthor,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub strategy: Strategy,
    pub query_time: Duration,
    pub materialization_time: Duration,
    pub total_time: Duration,
    pub author_count: usize,
    pub book_count: usize,
    /// SQL statements issued during the run, across both phases.
    pub queries_issued: usize,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub authors: Vec<Author>,
    pub report: TimingReport,
}

/// Runs fetch strategies against one repository. Every run gets a fresh
/// [`Session`], so nothing loaded in one run is visible to the next.
#[derive(Debug, Clone)]
pub struct Comparator {
    repository: AuthorRepository,
    lazy_batch_size: usize,
}

impl Comparator {
    pub fn new(repository: AuthorRepository) -> Self {
        Comparator {
            repository,
            lazy_batch_size: DEFAULT_LAZY_BATCH_SIZE,
        }
    }

    /// Batch size used to load pending collections under
    /// [`Strategy::IdListBatchSize`].
    pub fn lazy_batch_size(mut self, lazy_batch_size: usize) -> Self {
        self.lazy_batch_size = lazy_batch_size.max(1);
        self
    }

    pub fn repository(&self) -> &AuthorRepository {
        &self.repository
    }

    /// The ID list `1..=count`, cut off at the largest stored author ID since
    /// no author can match beyond it. The lookup goes through the shared
    /// repository, so it is not counted against the run.
    async fn id_list(&self, strategy: Strategy, count: u32) -> Result<Vec<i64>, DataAccessError> {
        if !strategy.uses_id_list() || count == 0 {
            return Ok(vec![]);
        }

        let max_author_id = self.repository.max_author_id().await?;
        let upper = i64::from(count).min(max_author_id);
        if upper < i64::from(count) {
            debug!(count, upper, "ID list cut off at the largest author ID");
        }
        Ok((1..=upper).collect())
    }

    /// Run `strategy`. `count` bounds the ID list `1..=count` and is ignored
    /// by strategies that read all authors. IDs with no author are simply
    /// absent from the result.
    #[instrument(skip(self, strategy), fields(strategy = %strategy))]
    pub async fn run(&self, strategy: Strategy, count: u32) -> Result<Comparison, DataAccessError> {
        let session = Session::new(
            self.repository.scoped(),
            strategy.fetch_policy(self.lazy_batch_size),
        );
        debug!(policy = ?session.policy(), "session opened");
        let ids = self.id_list(strategy, count).await?;

        let query_start = Instant::now();
        let mut authors = query(&session, strategy, &ids).await?;
        session.attach(&authors);
        let query_time = query_start.elapsed();
        info!(
            authors = authors.len(),
            query_ms = query_time.as_millis() as u64,
            "query phase finished",
        );

        let materialization_start = Instant::now();
        let mut book_count = 0;
        for author in authors.iter_mut() {
            let author_id = author.id;
            let num_books = session.materialize(author).await?.len();
            debug!(author_id, num_books, "materialized books");
            book_count += num_books;
        }
        let materialization_time = materialization_start.elapsed();

        let report = TimingReport {
            strategy,
            query_time,
            materialization_time,
            total_time: query_time + materialization_time,
            author_count: authors.len(),
            book_count,
            queries_issued: session.repository().queries().get(),
        };
        info!(
            authors = report.author_count,
            books = report.book_count,
            queries = report.queries_issued,
            lazy_loaded = session.num_loaded(),
            materialization_ms = report.materialization_time.as_millis() as u64,
            total_ms = report.total_time.as_millis() as u64,
            "comparison finished",
        );

        Ok(Comparison { authors, report })
    }
}

async fn query(
    session: &Session,
    strategy: Strategy,
    ids: &[i64],
) -> Result<Vec<Author>, DataAccessError> {
    let repository = session.repository();
    match strategy {
        Strategy::Naive => repository.fetch_all_authors().await,
        Strategy::JoinFetch => repository.fetch_all_authors_with_books_joined().await,
        Strategy::PrefetchGraph => repository.fetch_all_authors_via_prefetch_declaration().await,
        Strategy::LeftJoin => repository.fetch_all_authors_left_joined().await,
        Strategy::IdListNaive | Strategy::IdListBatchSize => {
            repository.fetch_authors_by_id_list(ids).await
        }
        Strategy::IdListJoined => repository.fetch_authors_by_id_list_with_books_joined(ids).await,
        Strategy::IdListJoinedBatched => query_in_batches(repository, ids).await,
    }
}

/// Run the joined ID-list query once per chunk of [`BATCH_SIZE`] IDs, one
/// chunk after another.
async fn query_in_batches(
    repository: &AuthorRepository,
    ids: &[i64],
) -> Result<Vec<Author>, DataAccessError> {
    let num_batches = ids.len().div_ceil(BATCH_SIZE);
    let mut authors = vec![];

    for (index, batch) in ids.chunks(BATCH_SIZE).enumerate() {
        let found = repository
            .fetch_authors_by_id_list_with_books_joined(batch)
            .await?;
        debug!(
            batch = index + 1,
            num_batches,
            batch_len = batch.len(),
            num_found = found.len(),
            "batch finished",
        );
        authors.extend(found);
    }

    Ok(authors)
}
