use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml parse error in {path}: {source}")]
    YamlParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnvVar { name: String, value: String },

    #[error("policy validation failed: {0}")]
    Domain(#[from] mvcp_domain::DomainError),
}
