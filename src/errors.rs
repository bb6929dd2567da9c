//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The top-level [`Error`] covers every failure a [`Character`](crate::Character)
//! operation can report:
//! - Asset loading and decoding failures ([`AssetError`], wrapped in [`Error::Load`])
//! - Models that load but can't be instantiated or rebound ([`Error::Assemble`])
//! - A base model that carries no skinned rig ([`Error::NoSkeleton`])
//! - Part operations issued before any base is ready ([`Error::NoBaseSkeleton`])
//! - Undeclared slot keys ([`Error::UnknownSlot`])
//! - Scene-graph invariant violations ([`SceneError`])
//!
//! Unmatched bones are *not* errors: they are returned as data inside
//! [`RebindReport`](crate::character::RebindReport).
//!
//! # Usage
//!
//! Character operations return [`Result<T>`], an alias for `std::result::Result<T, Error>`.
//! The asset layer reports bare [`AssetError`]s; the character wraps them with
//! the slot and locator they concern.
//!
//! ```rust,ignore
//! use loadout::errors::{Error, Result};
//!
//! async fn equip(character: &mut Character) -> Result<()> {
//!     character.set_slot("helmet", Some("parts/helmet.glb")).await?;
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// Identifies what a failed load was meant to populate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    /// The base model of the character.
    Base,
    /// A part destined for the named slot.
    Slot(String),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Slot(key) => write!(f, "slot '{key}'"),
        }
    }
}

/// The main error type.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Character Errors
    // ========================================================================
    /// The model behind `locator` could not be loaded for `target`.
    #[error("Failed to load {target} from '{locator}': {source}")]
    Load {
        /// Base or slot the load was issued for
        target: LoadTarget,
        /// The offending source locator
        locator: String,
        /// Underlying asset failure
        #[source]
        source: AssetError,
    },

    /// The model loaded but could not be instantiated or rebound for `target`.
    #[error("Failed to assemble {target} from '{locator}': {source}")]
    Assemble {
        /// Base or slot the model was meant for
        target: LoadTarget,
        /// The offending source locator
        locator: String,
        /// Underlying scene-graph violation
        #[source]
        source: SceneError,
    },

    /// The base model contains no skinned mesh, so nothing can be rebound onto it.
    #[error("Base model '{locator}' has no skinned mesh / skeleton")]
    NoSkeleton {
        /// Locator of the rejected base
        locator: String,
    },

    /// A part was requested before any base skeleton was ready.
    #[error("Cannot fill slot '{slot}': no base skeleton is loaded")]
    NoBaseSkeleton {
        /// Slot the request targeted
        slot: String,
    },

    /// The slot key was not declared when the character was constructed.
    #[error("Unknown slot '{slot}'")]
    UnknownSlot {
        /// The undeclared key
        slot: String,
    },

    /// The catalog has no entry with this name for the slot.
    #[error("Catalog has no entry '{entry}' for slot '{slot}'")]
    UnknownCatalogEntry {
        /// Slot that was searched
        slot: String,
        /// Entry name that was not found
        entry: String,
    },

    // ========================================================================
    // Scene Errors
    // ========================================================================
    /// The scene graph rejected an operation.
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Catalog / manifest JSON could not be parsed.
    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),
}

/// Failures raised while reading or decoding a model source.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The locator was empty or could not be resolved to a reader.
    #[error("Unsupported locator '{0}'")]
    UnsupportedLocator(String),

    /// No asset exists at the locator.
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport or status error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The source exceeds the configured size limit.
    #[error("Asset is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        /// Actual byte size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// The bytes could not be parsed in the expected format.
    #[error("Format error: {0}")]
    Format(String),

    /// The bytes parsed but describe inconsistent data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Base64 decoding error (data URIs).
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decode task failed to complete.
    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// Feature not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(String),
}

/// Scene-graph invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A handle no longer refers to a live node.
    #[error("Stale node handle")]
    StaleNode,

    /// A skeleton key no longer refers to a live skeleton.
    #[error("Stale skeleton key")]
    StaleSkeleton,

    /// Bone and inverse-bind-matrix arrays differ in length.
    #[error("Skeleton '{name}' has {bones} bones but {matrices} inverse bind matrices")]
    SkeletonMismatch {
        /// Skeleton name
        name: String,
        /// Bone count
        bones: usize,
        /// Inverse bind matrix count
        matrices: usize,
    },

    /// A prefab referenced a node or skeleton index it does not contain.
    #[error("Prefab index out of bounds: {context} (index: {index})")]
    PrefabIndexOutOfBounds {
        /// Description of what was being accessed
        context: &'static str,
        /// The invalid index
        index: usize,
    },
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

#[cfg(feature = "gltf")]
impl From<gltf::Error> for AssetError {
    fn from(err: gltf::Error) -> Self {
        AssetError::Format(err.to_string())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<tokio::task::JoinError> for AssetError {
    fn from(err: tokio::task::JoinError) -> Self {
        AssetError::TaskJoin(err.to_string())
    }
}

impl Error {
    /// Attaches `target` and `locator` to a bare scene-graph failure.
    /// Other variants already identify themselves and pass through.
    #[must_use]
    pub fn in_context(self, target: LoadTarget, locator: &str) -> Self {
        match self {
            Self::Scene(source) => Self::Assemble {
                target,
                locator: locator.to_string(),
                source,
            },
            other => other,
        }
    }

    /// Returns the source locator the failure concerns, if any.
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Load { locator, .. }
            | Self::Assemble { locator, .. }
            | Self::NoSkeleton { locator } => Some(locator),
            _ => None,
        }
    }

    /// Returns the slot the failure concerns, if any.
    #[must_use]
    pub fn slot(&self) -> Option<&str> {
        match self {
            Self::Load {
                target: LoadTarget::Slot(slot),
                ..
            }
            | Self::Assemble {
                target: LoadTarget::Slot(slot),
                ..
            }
            | Self::NoBaseSkeleton { slot }
            | Self::UnknownSlot { slot }
            | Self::UnknownCatalogEntry { slot, .. } => Some(slot),
            _ => None,
        }
    }
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
