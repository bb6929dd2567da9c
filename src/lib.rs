#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Modular skinned-character assembly.
//!
//! Load a rigged base model, then dress it with separately authored parts
//! (helmets, shirts, shoes...). Each part is cloned from a cached template and
//! its skinned meshes are rebound onto the base skeleton by bone name, so the
//! part deforms with the base as if it had been exported together with it.
//!
//! ```rust,ignore
//! use loadout::{Character, CharacterConfig};
//!
//! let mut character = Character::new(CharacterConfig::default());
//! character.load_base("models/base.glb").await?;
//! let report = character.set_slot("helmet", Some("models/parts/helmet.glb")).await?;
//! ```

pub mod assets;
pub mod character;
pub mod errors;
pub mod resources;
pub mod scene;

pub use assets::{AssetServer, LoaderSettings, Prefab, SharedPrefab};
pub use character::{
    Catalog, CatalogEntry, Character, CharacterConfig, CharacterState, RebindReport,
    SkeletonIndex, SlotOutcome, SlotRequest, SlotStatus, UnmatchedBoneWarning, rebind,
};
pub use errors::{AssetError, Error, LoadTarget, Result, SceneError};
pub use resources::{BoundingBox, Geometry, Material, Mesh};
pub use scene::{Fragment, Node, NodeHandle, Scene, Skeleton, SkeletonKey, Transform};
