use anyhow::Result;
use clap::Parser;
use venue_route::cli::{init_tracing, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    cli.run()
}
