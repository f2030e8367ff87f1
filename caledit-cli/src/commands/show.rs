use anyhow::Result;
use caledit_core::{EditorConfig, LocalCollection};

use crate::render::render_event;

pub fn run(collection: &LocalCollection, config: &EditorConfig, uid: &str) -> Result<()> {
    let event = collection.find_event(uid)?;

    for line in render_event(&event, &config.locale) {
        println!("{}", line);
    }

    Ok(())
}
