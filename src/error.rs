//! Error types for trailcam.

/// Result type alias for trailcam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for trailcam.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Failed to read an enhancement table file.
    #[error("failed to read enhancement tables '{path}'")]
    TablesRead {
        /// Path to the tables file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse an enhancement table file.
    #[error("failed to parse enhancement tables '{path}'")]
    TablesParse {
        /// Path to the tables file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Input directory does not exist or is not a directory.
    #[error("input directory does not exist: {path}")]
    InputDirNotFound {
        /// Path that was requested.
        path: std::path::PathBuf,
    },

    /// Failed to open or decode an image.
    #[error("failed to open image '{path}'")]
    ImageOpen {
        /// Path to the image file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: image::ImageError,
    },

    /// Image is too small to contain a usable picture.
    #[error("image '{path}' is too small ({width}x{height})")]
    ImageTooSmall {
        /// Path to the image file.
        path: std::path::PathBuf,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// Model file does not exist.
    #[error("model file does not exist: {path}")]
    ModelFileNotFound {
        /// Path to the missing model file.
        path: std::path::PathBuf,
    },

    /// Labels file does not exist.
    #[error("labels file does not exist: {path}")]
    LabelsFileNotFound {
        /// Path to the missing labels file.
        path: std::path::PathBuf,
    },

    /// Model is not configured.
    #[error("no {role} model configured (set models.{role} in config or pass --{role})")]
    ModelNotConfigured {
        /// Which model is missing (`detector` or `classifier`).
        role: &'static str,
    },

    /// Failed to load a model session.
    #[error("failed to load model '{path}': {reason}")]
    ModelLoad {
        /// Path to the model file.
        path: std::path::PathBuf,
        /// Description of the load failure.
        reason: String,
    },

    /// Inference failed.
    #[error("inference failed: {reason}")]
    Inference {
        /// Description of the inference failure.
        reason: String,
    },

    /// A capability payload did not have the expected shape.
    #[error("malformed model payload: {message}")]
    MalformedPayload {
        /// Description of the shape mismatch.
        message: String,
    },

    /// Species enhancement could not produce a result.
    #[error("species enhancement failed: {reason}")]
    Enhancement {
        /// Description of the failure.
        reason: String,
    },

    /// Image processing exceeded its time limit.
    #[error("processing took {elapsed_secs:.1}s, limit is {limit_secs:.1}s")]
    ProcessingTimeout {
        /// Elapsed wall-clock time.
        elapsed_secs: f64,
        /// Configured limit.
        limit_secs: f64,
    },

    /// Failed to write JSON output file.
    #[error("failed to write JSON output file '{path}'")]
    JsonWrite {
        /// Path to the JSON file.
        path: std::path::PathBuf,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read a JSON results file.
    #[error("failed to read JSON results file '{path}'")]
    JsonRead {
        /// Path to the JSON file.
        path: std::path::PathBuf,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write CSV output file.
    #[error("failed to write CSV output file '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}
