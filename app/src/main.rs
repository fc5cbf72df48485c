#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rollcall_app::run().await
}
