use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use nplusone_batch::http::{self, AuthorDto, AUTHOR_COUNT_HEADER, BOOK_COUNT_HEADER, QUERY_COUNT_HEADER};
use nplusone_batch::Comparator;

mod db;

async fn router(book_counts: &[usize]) -> anyhow::Result<Router> {
    let (repository, _) = db::with_book_counts(book_counts).await?;
    Ok(http::create_router(Comparator::new(repository)))
}

async fn get(router: &Router, uri: &str) -> anyhow::Result<Response> {
    let request = Request::builder().uri(uri).body(Body::empty())?;
    Ok(router.clone().oneshot(request).await?)
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_every_route_returns_authors() -> anyhow::Result<()> {
    let router = router(&[2, 0, 1]).await?;

    let expected = [
        ("/api/authors/with-n-plus-one", 3),
        ("/api/authors/without-n-plus-one", 2),
        ("/api/authors/with-entity-graph", 3),
        ("/api/authors/with-jpql", 3),
        ("/api/authors/test-in-query/3", 3),
        ("/api/authors/test-in-query-with-fetch/3", 2),
        ("/api/authors/test-in-query-with-batch-size/3", 3),
        ("/api/authors/test-in-query-batch-processing/3", 2),
    ];

    for (uri, num_authors) in expected {
        let response = get(&router, uri).await?;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(
            header(&response, AUTHOR_COUNT_HEADER),
            Some(num_authors.to_string()),
            "{uri}"
        );
        assert_eq!(header(&response, BOOK_COUNT_HEADER), Some("3".to_string()), "{uri}");

        let authors: Vec<AuthorDto> = body_json(response).await?;
        assert_eq!(authors.len(), num_authors, "{uri}");
        let books: usize = authors.iter().map(|author| author.books.len()).sum();
        assert_eq!(books, 3, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_response_shape() -> anyhow::Result<()> {
    let router = router(&[1]).await?;

    let response = get(&router, "/api/authors/with-jpql").await?;
    let body: serde_json::Value = body_json(response).await?;

    let author = &body[0];
    assert!(author["id"].is_i64());
    assert!(author["name"].is_string());
    assert_eq!(author["email"], "writer0@example.com");
    let book = &author["books"][0];
    assert_eq!(book["isbn"], "ISBN-0-0");
    assert_eq!(book["published_date"], "2024-06-01");
    assert!(book.get("author").is_none());
    assert!(book.get("author_id").is_none());
    Ok(())
}

#[tokio::test]
async fn test_n_plus_one_query_count_header() -> anyhow::Result<()> {
    let router = router(&[1, 1, 1, 1]).await?;

    let naive = get(&router, "/api/authors/with-n-plus-one").await?;
    assert_eq!(header(&naive, QUERY_COUNT_HEADER), Some("5".to_string()));

    let joined = get(&router, "/api/authors/without-n-plus-one").await?;
    assert_eq!(header(&joined, QUERY_COUNT_HEADER), Some("1".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_non_numeric_count_is_a_client_error() -> anyhow::Result<()> {
    let router = router(&[1]).await?;

    for uri in [
        "/api/authors/test-in-query/abc",
        "/api/authors/test-in-query-with-fetch/-1",
        "/api/authors/test-in-query-with-batch-size/1.5",
        "/api/authors/test-in-query-batch-processing/ten",
    ] {
        let response = get(&router, uri).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body: serde_json::Value = body_json(response).await?;
        assert_eq!(body["code"], "invalid_path", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() -> anyhow::Result<()> {
    let router = router(&[]).await?;

    let response = get(&router, "/api/authors/test-in-query/10").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let authors: Vec<AuthorDto> = body_json(response).await?;
    assert!(authors.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_largest_count_returns_stored_authors() -> anyhow::Result<()> {
    let router = router(&[1, 2]).await?;

    let response = get(&router, "/api/authors/test-in-query-batch-processing/4294967295").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, AUTHOR_COUNT_HEADER), Some("2".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_is_a_server_error() -> anyhow::Result<()> {
    let (repository, _) = db::with_book_counts(&[1]).await?;
    sqlx::query("DROP TABLE books").execute(repository.pool()).await?;
    let router = http::create_router(Comparator::new(repository));

    let response = get(&router, "/api/authors/with-jpql").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = body_json(response).await?;
    assert_eq!(body["code"], "internal_error");
    Ok(())
}

#[tokio::test]
async fn test_health() -> anyhow::Result<()> {
    let router = router(&[]).await?;

    let response = get(&router, "/health").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = body_json(response).await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}
