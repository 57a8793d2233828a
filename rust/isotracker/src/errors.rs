use std::path::PathBuf;
use xicindex::{
    IndexingError,
    ToleranceError,
};

// All numerical failures share one enum; the variant says what was expected
// and the context string says where.
#[derive(Debug)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedNonEmptyData {
        context: Option<String>,
    },
    ExpectedFiniteNonNanData {
        context: String,
    },
    ExpectedSetField {
        field: &'static str,
        context: String,
    },
    InsufficientPoints {
        needed: usize,
        got: usize,
        context: String,
    },
    IndexingError {
        error: IndexingError,
        context: String,
    },
}

impl From<IndexingError> for DataProcessingError {
    fn from(x: IndexingError) -> Self {
        Self::IndexingError {
            error: x,
            context: "".to_string(),
        }
    }
}

impl DataProcessingError {
    pub fn append_to_context(mut self, context: &str) -> Self {
        match &mut self {
            DataProcessingError::ExpectedSlicesSameLength {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::ExpectedNonEmptyData {
                context: owned_context,
            } => match owned_context {
                Some(x) => x.push_str(context),
                None => *owned_context = Some(context.to_string()),
            },
            DataProcessingError::ExpectedFiniteNonNanData {
                context: owned_context,
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::ExpectedSetField {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::InsufficientPoints {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
            DataProcessingError::IndexingError {
                context: owned_context,
                ..
            } => {
                owned_context.push_str(context);
            }
        }
        self
    }
}

/// Settings that make no sense, caught before any data is read.
#[derive(Debug)]
pub enum ConfigurationError {
    InvalidTolerance {
        field: &'static str,
        source: ToleranceError,
    },
    InvalidSetting {
        field: &'static str,
        reason: String,
    },
    InvalidMotif {
        motif: String,
        source: regex::Error,
    },
    NoIdentifications,
}

#[derive(Debug)]
pub enum IsoTrackerError {
    Configuration(ConfigurationError),
    DataProcessingError(DataProcessingError),
    Indexing(IndexingError),
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Csv(csv::Error),
    ParseError {
        msg: String,
    },
}

impl std::fmt::Display for IsoTrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for IsoTrackerError {}

pub type Result<T> = std::result::Result<T, IsoTrackerError>;

impl From<ConfigurationError> for IsoTrackerError {
    fn from(x: ConfigurationError) -> Self {
        Self::Configuration(x)
    }
}

impl From<DataProcessingError> for IsoTrackerError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessingError(x)
    }
}

impl From<IndexingError> for IsoTrackerError {
    fn from(x: IndexingError) -> Self {
        Self::Indexing(x)
    }
}

impl From<csv::Error> for IsoTrackerError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

impl From<std::num::ParseFloatError> for IsoTrackerError {
    fn from(x: std::num::ParseFloatError) -> Self {
        Self::ParseError { msg: x.to_string() }
    }
}

impl From<serde_json::Error> for IsoTrackerError {
    fn from(val: serde_json::Error) -> Self {
        IsoTrackerError::ParseError {
            msg: val.to_string(),
        }
    }
}
