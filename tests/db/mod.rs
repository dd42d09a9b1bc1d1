#![allow(unused)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use nplusone_batch::seed::{self, NewAuthor, NewBook, SeedOptions};
use nplusone_batch::{schema, Author, AuthorRepository, Book, Cache, Fetcher};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

/// An empty in-memory database with the schema in place.
pub async fn empty() -> anyhow::Result<AuthorRepository> {
    let pool = schema::open("sqlite::memory:", 1).await?;
    Ok(AuthorRepository::new(pool))
}

/// One author per entry of `book_counts`, with that many books each. Returns
/// the new author IDs in order.
pub async fn with_book_counts(
    book_counts: &[usize],
) -> anyhow::Result<(AuthorRepository, Vec<i64>)> {
    let repository = empty().await?;
    let authors: Vec<NewAuthor> = book_counts
        .iter()
        .enumerate()
        .map(|(n, book_count)| fake_author(n, *book_count))
        .collect();
    let ids = seed::insert_authors(&repository, &authors).await?;
    Ok((repository, ids))
}

/// The standard generated data set with `authors` authors.
pub async fn seeded(authors: u32) -> anyhow::Result<AuthorRepository> {
    let repository = empty().await?;
    seed::seed(
        &repository,
        SeedOptions {
            authors,
            today: today(),
        },
    )
    .await?;
    Ok(repository)
}

fn fake_author(n: usize, book_count: usize) -> NewAuthor {
    NewAuthor {
        name: fakeit::name::full(),
        email: Some(format!("writer{n}@example.com")),
        books: (0..book_count)
            .map(|b| NewBook {
                title: fakeit::words::sentence(3),
                isbn: Some(format!("ISBN-{n}-{b}")),
                published_date: Some(today()),
            })
            .collect(),
    }
}

/// Author ID to book IDs, for comparing results independent of order.
pub fn books_by_author(authors: &[Author]) -> BTreeMap<i64, Vec<i64>> {
    authors
        .iter()
        .map(|author| {
            let book_ids = author.books.as_slice().iter().map(|book| book.id).collect();
            (author.id, book_ids)
        })
        .collect()
}

/// Author ID to book count.
pub fn book_counts(authors: &[Author]) -> BTreeMap<i64, usize> {
    authors
        .iter()
        .map(|author| (author.id, author.books.as_slice().len()))
        .collect()
}

/// An in-memory stand-in for the books table.
pub struct Library {
    pub author_ids: Vec<i64>,
    pub books: Vec<Book>,
}

impl Library {
    pub fn fake(book_counts: &[usize]) -> Arc<Self> {
        let author_ids: Vec<i64> = (1..=book_counts.len() as i64).collect();
        let books = author_ids
            .iter()
            .zip(book_counts)
            .flat_map(|(author_id, book_count)| {
                (0..*book_count).map(move |_| (*author_id, fakeit::words::sentence(3)))
            })
            .enumerate()
            .map(|(n, (author_id, title))| Book {
                id: n as i64 + 1,
                title,
                isbn: None,
                published_date: None,
                author_id,
            })
            .collect();

        Arc::new(Library { author_ids, books })
    }
}

/// Fetches books from a [`Library`]. Unknown author IDs get no value.
pub struct FetchBooks {
    pub library: Arc<Library>,
}

#[async_trait]
impl Fetcher for FetchBooks {
    type Key = i64;
    type Value = Vec<Book>;
    type Error = anyhow::Error;

    async fn fetch(
        &self,
        keys: &[Self::Key],
        values: &mut Cache<'_, Self::Key, Self::Value>,
    ) -> Result<(), Self::Error> {
        for key in keys {
            if self.library.author_ids.contains(key) {
                let books = self
                    .library
                    .books
                    .iter()
                    .filter(|book| book.author_id == *key)
                    .cloned()
                    .collect();
                values.insert(*key, books);
            }
        }

        Ok(())
    }
}
