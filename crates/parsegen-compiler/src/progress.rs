//! Verbose-progress reporting: no `log`/`tracing` dependency —
//! verbosity here is a direct reflection of the CLI's own `-m`/`-l` flags,
//! not a structured-logging concern. The pipeline stages call
//! [`Progress::step`] exactly where the reference `main.cpp`'s
//! `verbose`-gated `std::println` calls sit.

use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Where progress messages go. Constructed once by the CLI from `-m`/`-l`
/// and threaded by reference into [`crate::pipeline::generate`].
pub enum Progress {
    Stdout,
    File(BufWriter<File>),
    Null,
}

impl Progress {
    pub fn file(path: &str) -> io::Result<Self> {
        if path == "-" {
            return Ok(Progress::Stdout);
        }
        Ok(Progress::File(BufWriter::new(File::create(path)?)))
    }

    /// Report a pipeline milestone ("parsing grammar", "building lexer", …).
    pub fn step(&mut self, message: &str) {
        match self {
            Progress::Stdout => println!("{message}"),
            Progress::File(w) => {
                let _ = writeln!(w, "{message}");
            }
            Progress::Null => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_dash_maps_to_stdout() {
        assert!(matches!(Progress::file("-").unwrap(), Progress::Stdout));
    }

    #[test]
    fn null_sink_discards_everything() {
        let mut p = Progress::Null;
        p.step("nothing should happen");
    }
}
