#[tokio::main]
async fn main() -> anyhow::Result<()> {
    desktop_relay::run().await
}
