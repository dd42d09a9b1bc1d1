//! Bulk test data.

use chrono::{Duration, Local, NaiveDate};
use tracing::{info, instrument};

use crate::repository::AuthorRepository;
use crate::DataAccessError;

/// Number of authors written per transaction.
const SEED_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub books: Vec<NewBook>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub authors: u32,
    /// Publication dates are counted back from this day.
    pub today: NaiveDate,
}

impl Default for SeedOptions {
    fn default() -> Self {
        SeedOptions {
            authors: 500,
            today: Local::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub authors: i64,
    pub books: i64,
}

/// The generated data set: author `i` (1-based) owns `(i % 5) + 1` books.
/// Fails if a publication date would fall before the earliest representable
/// date.
pub fn generate(options: &SeedOptions) -> Result<Vec<NewAuthor>, DataAccessError> {
    (1..=i64::from(options.authors))
        .map(|i| {
            let books = (1..=(i % 5) + 1)
                .map(|j| {
                    Ok(NewBook {
                        title: format!("Author {i} book {j}"),
                        isbn: Some(format!("ISBN-{i}-{j}")),
                        published_date: Some(days_before(options.today, i * j)?),
                    })
                })
                .collect::<Result<_, DataAccessError>>()?;

            Ok(NewAuthor {
                name: format!("Author {i}"),
                email: Some(format!("author{i}@example.com")),
                books,
            })
        })
        .collect()
}

fn days_before(today: NaiveDate, days: i64) -> Result<NaiveDate, DataAccessError> {
    Duration::try_days(days)
        .and_then(|duration| today.checked_sub_signed(duration))
        .ok_or(DataAccessError::DateOutOfRange { today, days })
}

/// Seed the generated data set unless the database already holds authors.
#[instrument(skip(repository))]
pub async fn seed(
    repository: &AuthorRepository,
    options: SeedOptions,
) -> Result<SeedSummary, DataAccessError> {
    if repository.count_authors().await? > 0 {
        info!("authors already present, skipping seed");
        return summarize(repository).await;
    }

    info!(authors = options.authors, "seeding test data");
    let authors = generate(&options)?;
    let mut written = 0;
    for chunk in authors.chunks(SEED_CHUNK_SIZE) {
        insert_authors(repository, chunk).await?;
        written += chunk.len();
        info!(written, "saved author chunk");
    }

    let summary = summarize(repository).await?;
    info!(authors = summary.authors, books = summary.books, "seeding finished");
    Ok(summary)
}

/// Insert authors and their books in one transaction, returning the new
/// author IDs in input order.
pub async fn insert_authors(
    repository: &AuthorRepository,
    authors: &[NewAuthor],
) -> Result<Vec<i64>, DataAccessError> {
    let mut tx = repository.pool().begin().await?;
    let mut ids = Vec::with_capacity(authors.len());

    for author in authors {
        let author_id = sqlx::query("INSERT INTO authors (name, email) VALUES (?, ?)")
            .bind(&author.name)
            .bind(&author.email)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for book in &author.books {
            sqlx::query(
                "INSERT INTO books (title, isbn, published_date, author_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&book.title)
            .bind(&book.isbn)
            .bind(book.published_date)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        }

        ids.push(author_id);
    }

    tx.commit().await?;
    Ok(ids)
}

async fn summarize(repository: &AuthorRepository) -> Result<SeedSummary, DataAccessError> {
    Ok(SeedSummary {
        authors: repository.count_authors().await?,
        books: repository.count_books().await?,
    })
}
