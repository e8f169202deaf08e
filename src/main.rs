use tracing::error;

use wgkeeper::cli;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::run().await {
        error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
