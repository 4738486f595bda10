use anyhow::Result;
use clap::Parser;

mod app;
mod cli;
mod panel;

use app::App;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let app = App::new(cli).await?;
    app.run_repl().await
}
