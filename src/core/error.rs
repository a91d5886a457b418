use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, InteropError>;

#[derive(thiserror::Error, Debug)]
pub enum InteropError {
    #[error("file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("no entry for {0} found in interop dump")]
    MissingSection(String),

    #[error("missing required column {column} in {table}")]
    MissingColumn { table: String, column: String },

    #[error("could not parse {value:?} in column {column} of {table} as {kind}")]
    Cast {
        table: String,
        column: String,
        value: String,
        kind: &'static str,
    },

    #[error("{0}")]
    EmptyData(String),

    #[error("output file {} already present", .0.display())]
    OutputExists(PathBuf),

    #[error("command `{command}` failed with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("error reading or writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to encode json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{context}, error: {source}")]
    Validation {
        context: String,
        source: Box<InteropError>,
    },
}

impl InteropError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InteropError::Io {
            path: path.into(),
            source,
        }
    }

    /// Innermost error beneath any number of `Validation` wrappers.
    pub fn root(&self) -> &InteropError {
        match self {
            InteropError::Validation { source, .. } => source.root(),
            other => other,
        }
    }
}

pub trait ValidationContext<T> {
    fn validation(self, context: &str) -> Result<T>;
}

impl<T> ValidationContext<T> for Result<T> {
    fn validation(self, context: &str) -> Result<T> {
        self.map_err(|e| InteropError::Validation {
            context: context.to_string(),
            source: Box::new(e),
        })
    }
}
