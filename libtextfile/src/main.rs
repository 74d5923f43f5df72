mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use libtextfile::Registry;
use libtextfile::demo::{e2e_localfs_demo, wait_flushed};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let registry = Registry::local(cli.options());

    match cli.command {
        Commands::Cat { path, create } => {
            let file = registry.get(&path, create)?;
            print!("{}", file.read().await?);
        }
        Commands::Write { path, text, create } => {
            let file = registry.get(&path, create)?;
            let mut rx = file.subscribe();
            file.write(text);
            wait_flushed(&mut rx).await?;
        }
        Commands::Demo { dir } => {
            e2e_localfs_demo(&dir).await?;
            println!("demo: OK");
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&registry.options())?);
        }
    }
    Ok(())
}
