#[tokio::main]
async fn main() -> Result<(), axum::BoxError> {
    etag_demo::main().await
}
