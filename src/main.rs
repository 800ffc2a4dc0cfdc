#[tokio::main]
async fn main() -> anyhow::Result<()> {
    castview::run().await
}
