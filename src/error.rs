use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("data error at line {line}, column '{column}': {message}")]
    Data {
        line: usize,
        column: String,
        message: String,
    },

    #[error("Invalid CSV format: header matches no known billing export")]
    UnrecognizedSchema,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl AppError {
    pub fn data(line: usize, column: &str, message: impl Into<String>) -> Self {
        AppError::Data {
            line,
            column: column.to_string(),
            message: message.into(),
        }
    }
}
