use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use datakit::error::DataKitError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type AssemblerResult<T> = Result<T, AssemblerError>;

/// Backtrace captured when an infrastructure error is raised.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the assembler binary.
///
/// Wraps [`DataKitError`] for cache, source and assembly failures, with separate variants for
/// configuration and output errors.
#[derive(Debug)]
pub enum AssemblerError {
    Assembly(DataKitError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl AssemblerError {
    pub fn category(&self) -> &'static str {
        match self {
            AssemblerError::Assembly(_) => "assembly error",
            AssemblerError::Config(_, _) => "configuration error",
            AssemblerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            AssemblerError::Assembly(err) => err.backtrace(),
            AssemblerError::Config(_, cb) => Some(&cb.0),
            AssemblerError::Io(_, cb) => Some(&cb.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        AssemblerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a report for terminal output: category, error, cause chain and, when
    /// `RUST_BACKTRACE` is set, the backtrace.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("assembler failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        // Aggregated errors already print every member in their display output.
        if !matches!(self, AssemblerError::Assembly(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblerError::Assembly(err) => write!(f, "{err}"),
            AssemblerError::Config(source, _) => write!(f, "configuration error: {source}"),
            AssemblerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for AssemblerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssemblerError::Assembly(err) => err.source(),
            AssemblerError::Config(source, _) => Some(source.as_ref()),
            AssemblerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for AssemblerError {
    fn from(err: std::io::Error) -> Self {
        AssemblerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<DataKitError> for AssemblerError {
    fn from(err: DataKitError) -> Self {
        AssemblerError::Assembly(err)
    }
}
