use thiserror::Error;

use crate::scene::NodeId;

/// Top-level error type for rig construction and lifecycle operations.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("Chain is empty")]
    EmptyChain,

    #[error("Not enough segments: need at least {needed}, got {got}")]
    TooFewSegments { needed: usize, got: usize },

    #[error("Segment {0:?} appears more than once in the chain")]
    DuplicateSegment(NodeId),

    #[error("Segments do not form a single unbranched chain: {0}")]
    NotAChain(String),

    #[error("Operation `{operation}` is not supported for component `{component}`")]
    Unsupported {
        operation: &'static str,
        component: String,
    },

    #[error("Unknown component")]
    UnknownComponent,

    #[error("Component `{0}` has already been grouped")]
    AlreadyGrouped(String),

    #[error("Component `{0}` is not bound")]
    NotBound(String),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by a [`SceneGraph`](crate::scene::SceneGraph) host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Attribute `{attribute}` not found on node {node:?}")]
    AttributeNotFound { node: NodeId, attribute: String },

    #[error("Attribute `{attribute}` already exists on node {node:?}")]
    AttributeExists { node: NodeId, attribute: String },

    #[error("Type mismatch on `{attribute}`: expected {expected}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
    },

    #[error("Invalid range for `{attribute}`: {min}..{max}")]
    InvalidRange {
        attribute: String,
        min: f32,
        max: f32,
    },

    #[error("Cannot parent {node:?} under {parent:?}")]
    InvalidParent { node: NodeId, parent: NodeId },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

pub type Result<T, E = RigError> = std::result::Result<T, E>;
