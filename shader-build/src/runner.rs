/// SPIR-V compiler invocation with per-task timing and reporting.
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

// ANSI color codes
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";

pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";

#[derive(Debug)]
pub enum BuildError {
    /// The compiler binary could not be launched at all.
    CompilerLaunch {
        tool: String,
        cause: std::io::Error,
    },
    /// The compiler ran and rejected the source.
    CompileFailed { source: PathBuf },
    /// A listed source file is missing on disk.
    MissingSource { source: PathBuf },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::CompilerLaunch { tool, cause } => {
                write!(f, "failed to launch {}: {}", tool, cause)
            }
            BuildError::CompileFailed { source } => {
                write!(f, "compilation failed for {}", source.display())
            }
            BuildError::MissingSource { source } => {
                write!(f, "shader source missing: {}", source.display())
            }
        }
    }
}

impl std::error::Error for BuildError {}

pub fn print_success(message: &str) {
    println!("{}{} {} {}{}", BOLD, GREEN, CHECK, message, RESET);
}

pub fn print_error(message: &str) {
    println!("{}{} {} {}{}", BOLD, RED, CROSS, message, RESET);
}

/// Run `<compiler> -V <source> -o <output>`, inheriting stdio so compiler
/// diagnostics stream through in real time.
pub fn compile_shader(compiler: &str, source: &Path, output: &Path) -> Result<Duration, BuildError> {
    if !source.exists() {
        return Err(BuildError::MissingSource {
            source: source.to_path_buf(),
        });
    }

    let start_time = Instant::now();
    let status = Command::new(compiler)
        .arg("-V")
        .arg(source)
        .arg("-o")
        .arg(output)
        .status()
        .map_err(|cause| BuildError::CompilerLaunch {
            tool: compiler.to_string(),
            cause,
        })?;
    let duration = start_time.elapsed();

    if status.success() {
        print_success(&format!(
            "{} compiled in {:.2}s",
            source.display(),
            duration.as_secs_f64()
        ));
        Ok(duration)
    } else {
        print_error(&format!(
            "{} failed after {:.2}s",
            source.display(),
            duration.as_secs_f64()
        ));
        Err(BuildError::CompileFailed {
            source: source.to_path_buf(),
        })
    }
}
