use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    spot_maker_cli::app_init()?;
    spot_maker_cli::run().await
}
