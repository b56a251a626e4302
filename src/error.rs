use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkyError>;

#[derive(Debug, Error)]
pub enum SkyError {
    #[error("Invalid HEALPix map: {actual} pixels, expected {expected} (12 * nside^2)")]
    InvalidMap { actual: usize, expected: usize },

    #[error("HEALPix pixel {ipix} out of range for npix = {npix}")]
    PixelOutOfRange { ipix: u64, npix: u64 },

    #[error("Malformed coordinate on line {line}: '{text}'")]
    MalformedCoordinate { line: usize, text: String },

    #[error("Malformed probability on line {line}: '{text}'")]
    MalformedProbability { line: usize, text: String },

    #[error("Invalid config: {field} = {value} (must be finite and positive)")]
    InvalidConfig { field: &'static str, value: f64 },

    #[error("No valid {what} found")]
    EmptyResult { what: &'static str },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl SkyError {
    pub fn invalid_map(actual: usize, expected: usize) -> Self {
        Self::InvalidMap { actual, expected }
    }

    pub fn pixel_out_of_range(ipix: u64, npix: u64) -> Self {
        Self::PixelOutOfRange { ipix, npix }
    }

    pub fn malformed_coordinate(line: usize, text: impl Into<String>) -> Self {
        Self::MalformedCoordinate {
            line,
            text: text.into(),
        }
    }

    pub fn malformed_probability(line: usize, text: impl Into<String>) -> Self {
        Self::MalformedProbability {
            line,
            text: text.into(),
        }
    }

    pub fn invalid_config(field: &'static str, value: f64) -> Self {
        Self::InvalidConfig { field, value }
    }

    pub fn empty_result(what: &'static str) -> Self {
        Self::EmptyResult { what }
    }
}
