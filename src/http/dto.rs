use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Author, Book};

/// An author with its books. Books are embedded here and never point back to
/// their author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub books: Vec<BookDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDto {
    pub id: i64,
    pub title: String,
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
}

impl From<&Author> for AuthorDto {
    fn from(author: &Author) -> Self {
        AuthorDto {
            id: author.id,
            name: author.name.clone(),
            email: author.email.clone(),
            books: author.books.as_slice().iter().map(BookDto::from).collect(),
        }
    }
}

impl From<&Book> for BookDto {
    fn from(book: &Book) -> Self {
        BookDto {
            id: book.id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            published_date: book.published_date,
        }
    }
}
