use thiserror::Error;

/// Errors surfaced by the HSI pipeline. Configuration problems halt the run
/// before any raster work starts; computation and store failures abort the
/// run where they occur, with no partial-result cleanup.
#[derive(Debug, Error)]
pub enum HsiError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not parse coefficient of variation {input:?}")]
    Parse {
        input: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("raster computation failed: {0}")]
    Computation(String),

    #[error("raster {0:?} not found in store")]
    MissingRaster(String),

    #[error("i/o failure on {name:?}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset {name:?}")]
    Format {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HsiError {
    pub fn config(msg: impl Into<String>) -> Self {
        HsiError::Config(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        HsiError::Computation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HsiError>;
