//! Read queries over the `authors` and `books` tables.
//!
//! Every operation here issues parameterized SQL through `sqlx`. The
//! different shapes (plain, inner join, left join, prefetch, ID list) exist so
//! that the [`Comparator`](crate::Comparator) can contrast their access
//! patterns; they never differ in the data they return for an author that has
//! books.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::{Author, Book, BookCollection, DataAccessError};

/// Counts the SQL statements issued through an [`AuthorRepository`].
#[derive(Debug, Default, Clone)]
pub struct QueryCounter {
    count: Arc<AtomicUsize>,
}

impl QueryCounter {
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str) {
        let query_number = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(query_number, sql, "executing statement");
    }
}

/// Related data to load together with the authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefetch {
    /// Leave book collections pending.
    None,
    /// Materialize every author's books. Authors without books get an empty
    /// collection.
    Books,
}

/// Upper bound on `IN (...)` bind parameters per statement. SQLite rejects
/// statements with more than 32766.
const MAX_BIND_PARAMETERS: usize = 30_000;

#[derive(Debug, Clone, Copy)]
enum AuthorFilter<'a> {
    All,
    Ids(&'a [i64]),
}

impl<'a> AuthorFilter<'a> {
    /// One filter per statement. Long ID lists are split so that no statement
    /// exceeds [`MAX_BIND_PARAMETERS`].
    fn statements(self) -> Vec<AuthorFilter<'a>> {
        match self {
            AuthorFilter::All => vec![AuthorFilter::All],
            AuthorFilter::Ids(ids) => ids
                .chunks(MAX_BIND_PARAMETERS)
                .map(AuthorFilter::Ids)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Join {
    Inner,
    Left,
}

impl Join {
    fn keyword(self) -> &'static str {
        match self {
            Join::Inner => "JOIN",
            Join::Left => "LEFT JOIN",
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    name: String,
    email: Option<String>,
}

/// One row of an author/book join. Book columns are null for an author with
/// no books under a left join.
#[derive(sqlx::FromRow)]
struct AuthorBookRow {
    author_id: i64,
    author_name: String,
    author_email: Option<String>,
    book_id: Option<i64>,
    book_title: Option<String>,
    book_isbn: Option<String>,
    book_published_date: Option<NaiveDate>,
}

const AUTHOR_BOOK_COLUMNS: &str = "SELECT a.id AS author_id, a.name AS author_name, a.email AS author_email, \
     b.id AS book_id, b.title AS book_title, b.isbn AS book_isbn, b.published_date AS book_published_date \
     FROM authors a ";

/// Data access for authors and their books. Cloning is shallow and shares the
/// pool and the [`QueryCounter`].
#[derive(Debug, Clone)]
pub struct AuthorRepository {
    pool: SqlitePool,
    queries: QueryCounter,
}

impl AuthorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuthorRepository {
            pool,
            queries: QueryCounter::default(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn queries(&self) -> &QueryCounter {
        &self.queries
    }

    /// A repository over the same pool with its own query counter.
    pub fn scoped(&self) -> Self {
        AuthorRepository::new(self.pool.clone())
    }

    /// Every author, with book collections left pending.
    #[instrument(skip(self))]
    pub async fn fetch_all_authors(&self) -> Result<Vec<Author>, DataAccessError> {
        self.load_authors(AuthorFilter::All, Prefetch::None).await
    }

    /// Every author that has books, materialized from a single inner join.
    #[instrument(skip(self))]
    pub async fn fetch_all_authors_with_books_joined(&self) -> Result<Vec<Author>, DataAccessError> {
        self.fetch_joined(Join::Inner, AuthorFilter::All).await
    }

    /// Every author with its books materialized, driven by a [`Prefetch`]
    /// declaration instead of a join clause. Returns the same authors and
    /// books as [`fetch_all_authors_left_joined`](Self::fetch_all_authors_left_joined).
    #[instrument(skip(self))]
    pub async fn fetch_all_authors_via_prefetch_declaration(
        &self,
    ) -> Result<Vec<Author>, DataAccessError> {
        self.fetch_all_authors_with(Prefetch::Books).await
    }

    pub async fn fetch_all_authors_with(
        &self,
        prefetch: Prefetch,
    ) -> Result<Vec<Author>, DataAccessError> {
        self.load_authors(AuthorFilter::All, prefetch).await
    }

    /// Every author, including those without books, from a single left join.
    #[instrument(skip(self))]
    pub async fn fetch_all_authors_left_joined(&self) -> Result<Vec<Author>, DataAccessError> {
        self.fetch_joined(Join::Left, AuthorFilter::All).await
    }

    /// Authors whose ID is in `ids`, with book collections left pending.
    #[instrument(skip_all, fields(num_ids = ids.len()))]
    pub async fn fetch_authors_by_id_list(&self, ids: &[i64]) -> Result<Vec<Author>, DataAccessError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.load_authors(AuthorFilter::Ids(ids), Prefetch::None).await
    }

    /// Authors whose ID is in `ids` and that have books, materialized from an
    /// inner join. The author columns repeat once per book and are folded back
    /// into one [`Author`] each.
    #[instrument(skip_all, fields(num_ids = ids.len()))]
    pub async fn fetch_authors_by_id_list_with_books_joined(
        &self,
        ids: &[i64],
    ) -> Result<Vec<Author>, DataAccessError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.fetch_joined(Join::Inner, AuthorFilter::Ids(ids)).await
    }

    /// Every book owned by one of `author_ids`, ordered by author then book.
    #[instrument(skip_all, fields(num_authors = author_ids.len()))]
    pub async fn books_for_authors(&self, author_ids: &[i64]) -> Result<Vec<Book>, DataAccessError> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut books = vec![];
        for author_ids in author_ids.chunks(MAX_BIND_PARAMETERS) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT id, title, isbn, published_date, author_id FROM books WHERE author_id",
            );
            push_id_list(&mut builder, author_ids);
            builder.push(" ORDER BY author_id, id");

            self.queries.record(builder.sql());
            let found = builder
                .build_query_as::<Book>()
                .fetch_all(&self.pool)
                .await?;
            books.extend(found);
        }
        Ok(books)
    }

    pub async fn count_authors(&self) -> Result<i64, DataAccessError> {
        self.scalar("SELECT COUNT(*) FROM authors").await
    }

    pub async fn count_books(&self) -> Result<i64, DataAccessError> {
        self.scalar("SELECT COUNT(*) FROM books").await
    }

    /// The largest author ID in use, or 0 when there are no authors.
    pub async fn max_author_id(&self) -> Result<i64, DataAccessError> {
        self.scalar("SELECT COALESCE(MAX(id), 0) FROM authors").await
    }

    async fn scalar(&self, sql: &'static str) -> Result<i64, DataAccessError> {
        self.queries.record(sql);
        let count = sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn load_authors(
        &self,
        filter: AuthorFilter<'_>,
        prefetch: Prefetch,
    ) -> Result<Vec<Author>, DataAccessError> {
        let mut rows = vec![];
        for filter in filter.statements() {
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name, email FROM authors");
            if let AuthorFilter::Ids(ids) = filter {
                builder.push(" WHERE id");
                push_id_list(&mut builder, ids);
            }
            builder.push(" ORDER BY id");

            self.queries.record(builder.sql());
            let found = builder
                .build_query_as::<AuthorRow>()
                .fetch_all(&self.pool)
                .await?;
            rows.extend(found);
        }

        let mut authors: Vec<Author> = rows
            .into_iter()
            .map(|row| Author::pending(row.id, row.name, row.email))
            .collect();

        if prefetch == Prefetch::Books {
            let ids: Vec<i64> = authors.iter().map(|author| author.id).collect();
            let mut books_by_author: HashMap<i64, Vec<Book>> = HashMap::new();
            for book in self.books_for_authors(&ids).await? {
                books_by_author.entry(book.author_id).or_default().push(book);
            }

            for author in authors.iter_mut() {
                let books = books_by_author.remove(&author.id).unwrap_or_default();
                author.books = BookCollection::Loaded(books);
            }
        }

        debug!(num_authors = authors.len(), ?prefetch, "loaded authors");
        Ok(authors)
    }

    async fn fetch_joined(
        &self,
        join: Join,
        filter: AuthorFilter<'_>,
    ) -> Result<Vec<Author>, DataAccessError> {
        let mut rows = vec![];
        for filter in filter.statements() {
            let mut builder = QueryBuilder::<Sqlite>::new(AUTHOR_BOOK_COLUMNS);
            builder.push(join.keyword());
            builder.push(" books b ON b.author_id = a.id");
            if let AuthorFilter::Ids(ids) = filter {
                builder.push(" WHERE a.id");
                push_id_list(&mut builder, ids);
            }
            builder.push(" ORDER BY a.id, b.id");

            self.queries.record(builder.sql());
            let found = builder
                .build_query_as::<AuthorBookRow>()
                .fetch_all(&self.pool)
                .await?;
            rows.extend(found);
        }

        let num_rows = rows.len();
        let authors = fold_joined_rows(rows);
        debug!(num_rows, num_authors = authors.len(), "de-duplicated joined rows");
        Ok(authors)
    }
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Collapse join rows into one loaded [`Author`] per distinct author ID,
/// keeping the order in which authors first appear.
fn fold_joined_rows(rows: Vec<AuthorBookRow>) -> Vec<Author> {
    let mut authors: Vec<Author> = vec![];
    let mut index_by_id: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let index = *index_by_id.entry(row.author_id).or_insert_with(|| {
            authors.push(Author::loaded(row.author_id, row.author_name, row.author_email));
            authors.len() - 1
        });

        if let (Some(id), Some(title)) = (row.book_id, row.book_title) {
            authors[index].books.push(Book {
                id,
                title,
                isbn: row.book_isbn,
                published_date: row.book_published_date,
                author_id: row.author_id,
            });
        }
    }

    authors
}
