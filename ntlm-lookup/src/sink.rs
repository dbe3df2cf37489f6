use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use indicatif::ProgressBar;

use crate::error::{Error, Result};

/// Writes result and status lines to the console and, optionally, to a
/// durable output stream so the file is a complete run log.
///
/// Result lines go to stdout, status and error lines to stderr. Every line
/// is also appended to the output stream when one is configured. Call
/// [`ResultSink::finish`] to flush; dropping the sink only flushes on a
/// best-effort basis.
///
/// Only the output stream is load-bearing. A console write that fails (a
/// closed pipe, say) is logged and the run carries on.
pub struct ResultSink<W: Write> {
    output: Option<W>,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
    progress: Option<ProgressBar>,
    lines_written: u64,
}

impl ResultSink<BufWriter<File>> {
    /// Opens (truncating, or appending if `append`) the output file at `path`,
    /// or builds a console-only sink when `path` is `None`.
    pub fn open(path: Option<&Path>, append: bool) -> Result<Self> {
        let output = match path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(path)
                    .map_err(|source| Error::OutputOpen { path: path.to_path_buf(), source })?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        Ok(Self::new(output))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(output: Option<W>) -> Self {
        Self {
            output,
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            progress: None,
            lines_written: 0,
        }
    }

    /// Replaces the console streams used for result and status lines.
    pub fn with_console(mut self, stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    /// Routes console writes through `progress` so the bar is not torn.
    pub fn attach_progress(&mut self, progress: ProgressBar) {
        self.progress = Some(progress);
    }

    /// Emits one `<hash>:<password>` or `<hash>:[not found]` line.
    pub fn emit(&mut self, line: &str) -> Result<()> {
        self.write_console(line, false);
        self.write_output(line)
    }

    /// Emits a status or error line. It goes to stderr and into the output file.
    pub fn status(&mut self, line: &str) -> Result<()> {
        self.write_console(line, true);
        self.write_output(line)
    }

    /// Number of lines written through this sink so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Flushes and hands back the output stream.
    pub fn finish(mut self) -> Result<Option<W>> {
        if let Some(out) = self.output.as_mut() {
            out.flush().map_err(Error::OutputWrite)?;
        }
        Ok(self.output.take())
    }

    fn write_console(&mut self, line: &str, to_stderr: bool) {
        let console = if to_stderr { &mut self.stderr } else { &mut self.stdout };
        let mut write = || -> io::Result<()> {
            writeln!(console, "{line}")?;
            console.flush()
        };

        let res = match &self.progress {
            Some(pb) => pb.suspend(write),
            None => write(),
        };
        self.lines_written += 1;
        if let Err(e) = res {
            tracing::warn!(error = %e, stderr = to_stderr, "console write failed");
        }
    }

    fn write_output(&mut self, line: &str) -> Result<()> {
        if let Some(out) = self.output.as_mut() {
            writeln!(out, "{line}").map_err(Error::OutputWrite)?;
        }
        Ok(())
    }
}
