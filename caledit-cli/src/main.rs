mod commands;
mod render;

use anyhow::Result;
use caledit_core::{EditorConfig, LocalCollection};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::EditArgs;

#[derive(Parser)]
#[command(name = "caledit")]
#[command(about = "Edit the events in your calendar directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List calendars
    Calendars,

    /// Print an event
    Show { uid: String },

    /// Edit an event
    Edit {
        uid: String,

        #[command(flatten)]
        edits: EditArgs,

        /// Save without asking
        #[arg(long)]
        save: bool,

        /// Write the event, as stored before this edit, to an .ics file
        #[arg(long, value_name = "PATH")]
        export: Option<String>,
    },

    /// Create an event
    New {
        title: String,

        /// Day of the event, in the configured date format
        #[arg(short, long)]
        date: String,

        #[command(flatten)]
        edits: EditArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = EditorConfig::load()?;
    let collection = LocalCollection::from_config(&config);

    match cli.command {
        Commands::Calendars => commands::calendars::run(&collection),
        Commands::Show { uid } => {
            require_calendars(&collection)?;
            commands::show::run(&collection, &config, &uid)
        }
        Commands::Edit {
            uid,
            edits,
            save,
            export,
        } => {
            require_calendars(&collection)?;
            commands::edit::run(collection, &config, &uid, &edits, save, export.as_deref())
        }
        Commands::New { title, date, edits } => {
            require_calendars(&collection)?;
            commands::new::run(collection, &config, &title, &date, &edits)
        }
    }
}

fn require_calendars(collection: &LocalCollection) -> Result<()> {
    if collection.calendars().is_empty() {
        anyhow::bail!(
            "No calendars found in {}.\n\n\
            A calendar is a directory containing a .caledit/ folder, e.g.:\n  \
            mkdir -p {}/personal/.caledit",
            collection.root().display(),
            collection.root().display()
        );
    }

    Ok(())
}
