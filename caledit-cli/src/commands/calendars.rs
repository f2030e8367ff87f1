use anyhow::Result;
use caledit_core::LocalCollection;
use owo_colors::OwoColorize;

pub fn run(collection: &LocalCollection) -> Result<()> {
    let calendars = collection.calendars();

    if calendars.is_empty() {
        println!(
            "{}",
            format!("No calendars in {}", collection.root().display()).dimmed()
        );
        return Ok(());
    }

    for name in calendars {
        let config = collection.calendar_config(&name)?;
        let count = collection.events(&name)?.len();

        let mut line = format!("📅 {}", name);
        if let Some(display_name) = config.display_name.as_deref().filter(|d| *d != name) {
            line.push_str(&format!(" ({})", display_name));
        }
        line.push_str(&format!(" {}", format!("{} events", count).dimmed()));
        if config.read_only {
            line.push_str(&format!(" {}", "read-only".yellow()));
        }

        println!("{}", line);
    }

    Ok(())
}
