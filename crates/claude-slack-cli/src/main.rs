#![forbid(unsafe_code)]

use clap::Parser;
use claude_slack_cli::{run, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}
