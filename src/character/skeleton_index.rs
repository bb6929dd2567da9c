use rustc_hash::FxHashMap;

use crate::errors::{Result, SceneError};
use crate::scene::{NodeHandle, Scene, Skeleton, SkeletonKey};

/// Bone name → bone node lookup for one skeleton.
///
/// Built once the skeleton is final and never refreshed on its own; rebuild
/// it whenever the skeleton it describes is replaced. When two bones share a
/// name the later one in bone order wins. Unnamed bones are not indexed.
#[derive(Debug, Clone, Default)]
pub struct SkeletonIndex {
    skeleton: Option<SkeletonKey>,
    bones: FxHashMap<String, NodeHandle>,
}

impl SkeletonIndex {
    /// Indexes the pooled skeleton `key`.
    pub fn build(scene: &Scene, key: SkeletonKey) -> Result<Self> {
        let skeleton = scene.get_skeleton(key).ok_or(SceneError::StaleSkeleton)?;
        let mut index = Self::from_skeleton(scene, skeleton);
        index.skeleton = Some(key);
        Ok(index)
    }

    /// Indexes a skeleton that may not live in the pool.
    #[must_use]
    pub fn from_skeleton(scene: &Scene, skeleton: &Skeleton) -> Self {
        let mut bones = FxHashMap::default();
        bones.reserve(skeleton.bone_count());

        for &bone in skeleton.bones() {
            if let Some(name) = scene.get_name(bone)
                && let Some(previous) = bones.insert(name.to_string(), bone)
            {
                log::debug!(
                    "Skeleton '{}': duplicate bone name '{}', {:?} replaced by {:?}",
                    skeleton.name,
                    name,
                    previous,
                    bone
                );
            }
        }

        Self {
            skeleton: None,
            bones,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeHandle> {
        self.bones.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bones.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// The pooled skeleton this index was built from, if any.
    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> Option<SkeletonKey> {
        self.skeleton
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bones.keys().map(String::as_str)
    }
}
