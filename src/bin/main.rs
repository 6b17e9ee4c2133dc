#[tokio::main]
async fn main() -> ontoeval::Result<()> {
    ontoeval::cli::main().await
}
