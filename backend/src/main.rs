#[tokio::main]
async fn main() -> anyhow::Result<()> {
    notebook::start_server().await
}
