//! Error types for duotalk.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuotalkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transcription errors
    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Translation errors
    #[error("Translation error: {message}")]
    Translation { message: String },

    // Glossary errors
    #[error("Invalid glossary rule '{pattern}': {message}")]
    GlossaryRule { pattern: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DuotalkError>;
