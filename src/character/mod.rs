//! Modular character assembly.
//!
//! - [`SkeletonIndex`]: bone name → bone node lookup for the base skeleton
//! - [`rebind`]: moves a part's skinned meshes onto base bones by name
//! - [`SlotRegistry`]: named attachment points, one part each
//! - [`Character`]: base model + slots, with request-token based loading
//! - [`Catalog`] / [`CharacterConfig`]: injected part lists and settings

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod rebind;
pub mod skeleton_index;
pub mod slots;

pub use assembler::{Character, CharacterState, SlotOutcome, SlotRequest};
pub use catalog::{Catalog, CatalogEntry};
pub use config::{CharacterConfig, DEFAULT_SLOTS};
pub use rebind::{RebindReport, UNNAMED_BONE, UnmatchedBoneWarning, rebind};
pub use skeleton_index::SkeletonIndex;
pub use slots::{SlotOccupant, SlotRegistry, SlotStatus};
