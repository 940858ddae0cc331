#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sleeptracker_lib::run().await
}
