//! Transcript file for replay runs.
//!
//! Everything the replay prints to stdout can be mirrored to a file so a run
//! can be reviewed or diffed afterwards.

use std::fmt;
use std::io::{self, Write as _};
use std::path::Path;
use std::sync::OnceLock;

use parking_lot::Mutex;

static TRANSCRIPT_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();

fn transcript_slot() -> &'static Mutex<Option<std::fs::File>> {
    TRANSCRIPT_FILE.get_or_init(|| Mutex::new(None))
}

/// Open (or truncate) the transcript file at `path`, creating parent
/// directories as needed.
pub fn init_transcript(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    *transcript_slot().lock() = Some(file);
    log::info!("Writing transcript to {}", path.display());
    Ok(())
}

/// Stop mirroring to the transcript file.
pub fn close_transcript() {
    if let Some(mut file) = transcript_slot().lock().take() {
        let _ = file.flush();
    }
}

/// Write a line to stdout and, if a transcript file is open, to it as well.
pub fn println_tee(args: fmt::Arguments<'_>) {
    let line = fmt::format(args);

    {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }

    if let Some(file) = transcript_slot().lock().as_mut() {
        let _ = writeln!(file, "{line}");
        let _ = file.flush();
    }
}
