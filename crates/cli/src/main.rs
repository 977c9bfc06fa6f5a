//! actor-bench CLI entry point.

use clap::Parser;
use colored::Colorize;

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = actor_bench_cli::Cli::parse();
    if let Err(e) = actor_bench_cli::run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
