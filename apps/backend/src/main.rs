#[tokio::main]
async fn main() -> anyhow::Result<()> {
    certprep_backend::run().await
}
