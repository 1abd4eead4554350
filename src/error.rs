//! Error types for document loading, configuration and model generation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a document or config from disk, text or network.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("reference not found: {pointer}")]
    PointerNotFound { pointer: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while building a resource model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("schema not found: {name}")]
    SchemaNotFound { name: String },

    #[error("operation not found in document: {operation}")]
    OperationNotFound { operation: String },

    #[error("no {role} configured")]
    MissingOperation { role: &'static str },

    #[error("unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("resource '{resource}': {source}")]
    Resource {
        resource: String,
        #[source]
        source: Box<ModelError>,
    },
}

impl ModelError {
    /// Wrap an error with the name of the resource that failed.
    pub fn for_resource(resource: impl Into<String>, source: ModelError) -> Self {
        ModelError::Resource {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Name of the failing resource, if wrapped.
    pub fn resource(&self) -> Option<&str> {
        match self {
            ModelError::Resource { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading generator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid config: {message}")]
    InvalidShape { message: String },

    #[error("config validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ConfigIssue> },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }
}

/// Single config validation finding with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfigIssue {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("openapi.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::PointerNotFound {
            pointer: "#/components/schemas/Missing".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn config_error_exit_codes() {
        let err = ConfigError::Load(LoadError::FileNotFound {
            path: PathBuf::from("config.yaml"),
        });
        assert_eq!(err.exit_code(), 3);

        let err = ConfigError::Invalid {
            errors: vec![ConfigIssue {
                path: "/resources/0".into(),
                message: "\"name\" is a required property".into(),
            }],
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn resource_error_names_resource() {
        let err = ModelError::for_resource(
            "volume",
            ModelError::SchemaNotFound {
                name: "VolumeRequest".into(),
            },
        );
        assert_eq!(err.resource(), Some("volume"));
        assert_eq!(
            err.to_string(),
            "resource 'volume': schema not found: VolumeRequest"
        );
    }

    #[test]
    fn config_issue_display() {
        let issue = ConfigIssue {
            path: "/max_depth".into(),
            message: "-1 is less than the minimum of 1".into(),
        };
        assert_eq!(issue.to_string(), "/max_depth: -1 is less than the minimum of 1");
    }
}
