#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobwatch_server::start().await
}
