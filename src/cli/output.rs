//! Colored terminal output for the installer CLI.

use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Colored stdout reporter with verbose and quiet modes
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Creates a reporter writing to stdout
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn styled(&self, symbol: &str, spec: &ColorSpec, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        buffer.set_color(spec)?;
        write!(&mut buffer, "{symbol}")?;
        buffer.reset()?;
        writeln!(&mut buffer, " {message}")?;
        self.bufwtr.print(&buffer)
    }

    /// Print an info message
    pub fn info(&self, message: &str) -> std::io::Result<()> {
        self.styled("ℹ", ColorSpec::new().set_fg(Some(Color::Cyan)), message)
    }

    /// Print a green check line
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.styled(
            "✓",
            ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true),
            message,
        )
    }

    /// Print a yellow warning line
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.styled(
            "⚠",
            ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true),
            message,
        )
    }

    /// Print a verbose message (only in verbose mode)
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.styled("→", ColorSpec::new().set_fg(Some(Color::Blue)), message)
    }

    /// Print an error message to stderr, ignoring quiet mode
    pub fn error(&self, message: &str) {
        if write_error(message).is_err() {
            println!("[STDERR ERROR] ✗ {message}");
        }
    }

    /// Print indented text to stderr, under an error (always shown)
    pub fn error_detail(&self, message: &str) {
        eprintln!("    {message}");
    }

    /// Print a detail line under the previous message
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.bufwtr.buffer();
        writeln!(&mut buffer, "    {}", message)?;
        self.bufwtr.print(&buffer)
    }
}

fn write_error(message: &str) -> std::io::Result<()> {
    let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(&mut buffer, "✗")?;
    buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(false))?;
    writeln!(&mut buffer, " {message}")?;
    buffer.reset()?;
    bufwtr.print(&buffer)
}
