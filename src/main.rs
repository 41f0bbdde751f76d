#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sitehook_cli::cli::app::run().await
}
