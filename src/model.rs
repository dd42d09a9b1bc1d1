use chrono::NaiveDate;

/// A book row. The owning author is kept as a plain foreign key so that an
/// author and its books never reference each other.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub books: BookCollection,
}

impl Author {
    pub(crate) fn pending(id: i64, name: String, email: Option<String>) -> Self {
        Author {
            id,
            name,
            email,
            books: BookCollection::Pending,
        }
    }

    pub(crate) fn loaded(id: i64, name: String, email: Option<String>) -> Self {
        Author {
            id,
            name,
            email,
            books: BookCollection::Loaded(vec![]),
        }
    }
}

/// The books owned by an [`Author`]. A `Pending` collection has not been read
/// from storage yet; [`Session::materialize`](crate::Session::materialize)
/// turns it into a `Loaded` one, issuing queries as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookCollection {
    Pending,
    Loaded(Vec<Book>),
}

impl BookCollection {
    pub fn is_loaded(&self) -> bool {
        matches!(self, BookCollection::Loaded(_))
    }

    /// The loaded books, or an empty slice if the collection is still pending.
    pub fn as_slice(&self) -> &[Book] {
        match self {
            BookCollection::Loaded(books) => books,
            BookCollection::Pending => &[],
        }
    }

    pub(crate) fn push(&mut self, book: Book) {
        match self {
            BookCollection::Loaded(books) => books.push(book),
            BookCollection::Pending => *self = BookCollection::Loaded(vec![book]),
        }
    }
}
