//! Shelf CLI: serve the catalog, apply migrations, import catalog files.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_app::App;
use shelf_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(version)]
#[command(about = "Book catalog service")]
#[command(long_about = r#"
Shelf keeps a catalog of books, authors, categories and opinions.

Example usage:
  shelf migrate
  shelf import --path ./ksiazki.csv
  shelf import --path ./opinie.csv
  shelf serve
"#)]
struct Cli {
    /// Database file, overriding `database.path`
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and serve the HTTP API until Ctrl-C
    Serve,

    /// Apply pending migrations
    Migrate,

    /// Import a books or opinions file, selected by its file name
    Import {
        /// File to import
        #[arg(short, long)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load Shelf settings")?;
    if let Some(database) = &cli.database {
        settings.database.path = database.display().to_string();
    }
    if cli.verbose {
        settings.telemetry.filter = "debug".to_string();
    }
    shelf_telemetry::init(&settings.telemetry)?;

    let app = App::open(settings)?;

    match cli.command {
        Commands::Serve => app.serve().await?,

        Commands::Migrate => {
            let applied = app.migrate()?;
            println!("Applied {applied} migrations.");
            for migration in app.applied_migrations()? {
                println!("  {migration}");
            }
        }

        Commands::Import { path } => {
            app.migrate()?;
            let report = app
                .import(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            match report {
                Some(report) => println!("{report}"),
                None => tracing::info!(path = %path.display(), "nothing to import for this file name"),
            }
        }
    }

    Ok(())
}
