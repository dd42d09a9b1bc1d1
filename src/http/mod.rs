//! HTTP surface: one `GET` route per fetch strategy.

mod dto;
mod error;
mod routes;

pub use dto::{AuthorDto, BookDto};
pub use error::ApiError;
pub use routes::{
    create_router, AppState, CountParam, AUTHOR_COUNT_HEADER, BOOK_COUNT_HEADER,
    MATERIALIZATION_TIME_HEADER, QUERY_COUNT_HEADER, QUERY_TIME_HEADER, TOTAL_TIME_HEADER,
};
