mod handlers;

use clap::{CommandFactory, Parser, Subcommand};
use handlers::handle_fetch;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a shard from a URL and print its tensor table
    Fetch {
        /// Shard URL (redirects are followed)
        url: String,
        /// Number of concurrent ranged fetches
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Attempt budget per byte range
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Fetch {
            url,
            workers,
            retries,
        }) => {
            handle_fetch(url, workers, retries);
        },
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
        },
    }
}
