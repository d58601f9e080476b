use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf::application::service::CatalogService;
use bookshelf::infra::json_store::JsonCatalogRepository;
use bookshelf::interface::{cli, web};

/// bookshelf — personal library catalog over a single JSON file.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the JSON catalog file.
    #[arg(long, default_value = "books.json", env = "BOOKSHELF_DATA_FILE")]
    data_file: PathBuf,

    /// Path the CSV export is written to (menu option 7).
    #[arg(long, default_value = "exports/books.csv", env = "BOOKSHELF_EXPORT_FILE")]
    export_file: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the browser form UI instead of the terminal menu.
    Serve {
        /// Address to bind the web server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, default_value = "7420")]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // ログはstderrへ。メニュー画面のstdoutと混ざらないようにする。
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Some(Command::Serve { bind, port }) => tokio::runtime::Runtime::new()
            .context("start tokio runtime")?
            .block_on(web::run(args.data_file, &bind, port)),
        None => {
            let repo = JsonCatalogRepository::new(args.data_file);
            let service = CatalogService::new(repo);
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            cli::run(&service, &args.export_file, stdin.lock(), stdout.lock())
        }
    }
}
