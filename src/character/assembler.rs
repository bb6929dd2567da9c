//! Character assembly.
//!
//! [`Character`] owns a scene with one base model (which supplies the
//! canonical skeleton) and a fixed set of slots. Parts loaded into a slot are
//! cloned, rebound onto the base bones by name and attached under the slot's
//! anchor node.
//!
//! # Request tokens
//!
//! Loads are the only suspension points. A slot change can be split in three
//! so the load runs without borrowing the character:
//!
//! ```rust,ignore
//! let request = character.begin_set_slot("helmet", "parts/helmet.glb")?;
//! let result = character.load_part(&request).await;   // no borrow held
//! let outcome = character.complete_set_slot(request, result)?;
//! ```
//!
//! Only the latest request per slot is applied; anything older, or issued
//! before the base was replaced, completes as [`SlotOutcome::Stale`].

use crate::assets::{AssetServer, SharedPrefab};
use crate::character::config::CharacterConfig;
use crate::character::rebind::{RebindReport, rebind};
use crate::character::skeleton_index::SkeletonIndex;
use crate::character::slots::{SlotOccupant, SlotRegistry, SlotStatus};
use crate::errors::{AssetError, Error, LoadTarget, Result};
use crate::resources::BoundingBox;
use crate::scene::{Fragment, NodeHandle, Scene, SkeletonKey};

/// Lifecycle of the base model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterState {
    #[default]
    Unloaded,
    LoadingBase,
    Ready,
    /// The last base load failed. A previously committed base, if any, is intact.
    BaseLoadFailed,
}

/// The committed base model.
#[derive(Debug)]
struct Base {
    fragment: Fragment,
    skeleton: SkeletonKey,
    index: SkeletonIndex,
    locator: String,
}

/// A pending slot change, issued by [`Character::begin_set_slot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    pub slot: String,
    pub locator: String,
    token: u64,
    generation: u64,
}

/// How a slot request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// The part is attached.
    Applied(RebindReport),
    /// The slot was emptied (no locator given).
    Cleared,
    /// A newer request or a base replacement overtook this one; nothing changed.
    Stale,
}

impl SlotOutcome {
    /// Rebind report of an applied part.
    #[must_use]
    pub fn report(&self) -> Option<&RebindReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Cleared | Self::Stale => None,
        }
    }

    #[must_use]
    pub fn into_report(self) -> Option<RebindReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Cleared | Self::Stale => None,
        }
    }
}

/// Puts a slot back to its settled status if a load is dropped before it completes.
struct PendingLoad<'a> {
    slots: &'a mut SlotRegistry,
    slot: &'a str,
    token: u64,
    armed: bool,
}

impl PendingLoad<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Load for slot '{}' dropped before completion", self.slot);
            self.slots.abandon(self.slot, self.token);
        }
    }
}

/// A base model plus part slots.
pub struct Character {
    scene: Scene,
    root: NodeHandle,
    assets: AssetServer,
    config: CharacterConfig,

    base: Option<Base>,
    slots: SlotRegistry,
    state: CharacterState,
    /// Bumped on every committed base; in-flight slot requests carry the value they saw.
    base_generation: u64,
}

impl Character {
    /// Creates an empty character with its own asset server.
    #[must_use]
    pub fn new(config: CharacterConfig) -> Self {
        let assets = AssetServer::with_settings(config.loader.clone());
        Self::with_assets(config, assets)
    }

    /// Creates an empty character sharing `assets` (and its template cache).
    #[must_use]
    pub fn with_assets(config: CharacterConfig, assets: AssetServer) -> Self {
        let mut scene = Scene::new();
        let root = scene.create_node_with_name("character");
        scene.root_nodes.push(root);
        let slots = SlotRegistry::new(&mut scene, root, &config.slots);

        Self {
            scene,
            root,
            assets,
            config,
            base: None,
            slots,
            state: CharacterState::Unloaded,
            base_generation: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> CharacterState {
        self.state
    }

    #[must_use]
    pub fn assets(&self) -> &AssetServer {
        &self.assets
    }

    #[must_use]
    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CharacterConfig {
        &mut self.config
    }

    #[must_use]
    pub fn base_locator(&self) -> Option<&str> {
        self.base.as_ref().map(|b| b.locator.as_str())
    }

    #[must_use]
    pub fn base_fragment(&self) -> Option<&Fragment> {
        self.base.as_ref().map(|b| &b.fragment)
    }

    /// The canonical skeleton every part is rebound onto.
    #[must_use]
    pub fn base_skeleton(&self) -> Option<SkeletonKey> {
        self.base.as_ref().map(|b| b.skeleton)
    }

    #[must_use]
    pub fn skeleton_index(&self) -> Option<&SkeletonIndex> {
        self.base.as_ref().map(|b| &b.index)
    }

    #[must_use]
    pub fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    pub fn slot_status(&self, key: &str) -> Result<SlotStatus> {
        self.slots.status(key)
    }

    #[must_use]
    pub fn slot_statuses(&self) -> Vec<(&str, SlotStatus)> {
        self.slots.statuses()
    }

    pub fn slot_occupant(&self, key: &str) -> Result<Option<&SlotOccupant>> {
        self.slots.occupant(key)
    }

    // ========================================================================
    // Base
    // ========================================================================

    /// Loads a new base model.
    ///
    /// The new base is loaded, cloned, checked for a skeleton and indexed
    /// before anything is committed. On success every slot is cleared and the
    /// old base released; on failure the previous base and slots are left as
    /// they were. An empty locator does nothing.
    pub async fn load_base(&mut self, locator: &str) -> Result<()> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Ok(());
        }

        self.state = CharacterState::LoadingBase;
        log::info!("Loading base '{locator}'");

        let prefab = match self.assets.load_prefab_async(locator).await {
            Ok(prefab) => prefab,
            Err(source) => {
                return Err(self.fail_base(Error::Load {
                    target: LoadTarget::Base,
                    locator: locator.to_string(),
                    source,
                }));
            }
        };

        match self.prepare_base(&prefab, locator) {
            Ok(base) => {
                self.commit_base(base);
                Ok(())
            }
            Err(err) => Err(self.fail_base(err.in_context(LoadTarget::Base, locator))),
        }
    }

    /// Clones the template and builds its skeleton index, without committing.
    fn prepare_base(&mut self, prefab: &SharedPrefab, locator: &str) -> Result<Base> {
        let fragment = self.scene.instantiate(prefab)?;

        let Some(skeleton) = self.first_skeleton(fragment.root) else {
            self.scene.release_fragment(&fragment);
            return Err(Error::NoSkeleton {
                locator: locator.to_string(),
            });
        };

        let index = match SkeletonIndex::build(&self.scene, skeleton) {
            Ok(index) => index,
            Err(err) => {
                self.scene.release_fragment(&fragment);
                return Err(err);
            }
        };

        Ok(Base {
            fragment,
            skeleton,
            index,
            locator: locator.to_string(),
        })
    }

    /// Skeleton of the first skinned mesh in depth-first order.
    fn first_skeleton(&self, root: NodeHandle) -> Option<SkeletonKey> {
        self.scene
            .collect_subtree(root)
            .into_iter()
            .find_map(|node| self.scene.get_skin(node).map(|b| b.skeleton))
    }

    fn commit_base(&mut self, base: Base) {
        self.slots.clear_all(&mut self.scene);

        if let Some(old) = self.base.take() {
            self.scene.release_fragment(&old.fragment);
        }

        self.scene.attach(base.fragment.root, self.root);
        if let Some(node) = self.scene.get_node_mut(base.fragment.root) {
            node.transform.reset();
            node.transform.scale = glam::Vec3::splat(self.config.base_scale);
        }

        log::info!(
            "Base '{}' ready: {} bones indexed",
            base.locator,
            base.index.len()
        );

        self.base = Some(base);
        self.base_generation += 1;
        self.state = CharacterState::Ready;
    }

    fn fail_base(&mut self, err: Error) -> Error {
        log::error!("{err}");
        self.state = CharacterState::BaseLoadFailed;
        err
    }

    /// Reloads the current base (clearing every slot). Without a base, only
    /// clears the slots.
    pub async fn reset(&mut self) -> Result<()> {
        match self.base_locator().map(str::to_owned) {
            Some(locator) => self.load_base(&locator).await,
            None => {
                self.clear_all_slots();
                Ok(())
            }
        }
    }

    // ========================================================================
    // Slots
    // ========================================================================

    /// Fills or clears a slot and waits for the result.
    ///
    /// `None` or an empty locator clears the slot (allowed without a base).
    /// On failure the previous occupant stays attached. Dropping the returned
    /// future mid-load discards the request and restores the slot's status.
    pub async fn set_slot(&mut self, key: &str, locator: Option<&str>) -> Result<SlotOutcome> {
        let locator = locator.map(str::trim).unwrap_or_default();
        if locator.is_empty() {
            self.clear_slot(key)?;
            return Ok(SlotOutcome::Cleared);
        }

        let request = self.begin_set_slot(key, locator)?;
        let load = self.load_part(&request);

        let pending = PendingLoad {
            slots: &mut self.slots,
            slot: &request.slot,
            token: request.token,
            armed: true,
        };
        let result = load.await;
        pending.disarm();

        self.complete_set_slot(request, result)
    }

    /// Fills a slot from the configured catalog.
    pub async fn set_slot_from_catalog(
        &mut self,
        key: &str,
        entry_name: &str,
    ) -> Result<SlotOutcome> {
        let locator = self
            .config
            .catalog
            .find(key, entry_name)
            .map(|entry| entry.source_locator.clone())
            .ok_or_else(|| Error::UnknownCatalogEntry {
                slot: key.to_string(),
                entry: entry_name.to_string(),
            })?;

        self.set_slot(key, Some(&locator)).await
    }

    /// Step 1: validates the request, marks the slot `Loading` and issues a token.
    pub fn begin_set_slot(&mut self, key: &str, locator: &str) -> Result<SlotRequest> {
        if !self.slots.contains(key) {
            return Err(Error::UnknownSlot {
                slot: key.to_string(),
            });
        }
        if self.base.is_none() {
            return Err(Error::NoBaseSkeleton {
                slot: key.to_string(),
            });
        }

        let token = self.slots.begin_request(key)?;
        log::info!("Loading '{locator}' into slot '{key}'");

        Ok(SlotRequest {
            slot: key.to_string(),
            locator: locator.trim().to_string(),
            token,
            generation: self.base_generation,
        })
    }

    /// Step 2: the load itself. The returned future does not borrow the character.
    pub fn load_part(
        &self,
        request: &SlotRequest,
    ) -> impl Future<Output = std::result::Result<SharedPrefab, AssetError>> + Send + 'static {
        let assets = self.assets.clone();
        let locator = request.locator.clone();
        async move { assets.load_prefab_async(&locator).await }
    }

    /// Gives up on a request without completing it.
    ///
    /// The slot returns to the status it had before the request; a later
    /// `complete_set_slot` with this request is stale.
    pub fn abandon_set_slot(&mut self, request: SlotRequest) {
        self.slots.abandon(&request.slot, request.token);
    }

    /// Step 3: applies a finished load if the request is still current.
    ///
    /// Clone, rebind and attach happen only on full success; any failure
    /// leaves the previous occupant attached and marks the slot `Failed`.
    pub fn complete_set_slot(
        &mut self,
        request: SlotRequest,
        result: std::result::Result<SharedPrefab, AssetError>,
    ) -> Result<SlotOutcome> {
        let SlotRequest {
            slot,
            locator,
            token,
            generation,
        } = request;

        if !self.slots.is_current(&slot, token) || generation != self.base_generation {
            log::warn!("Discarding stale load of '{locator}' for slot '{slot}'");
            return Ok(SlotOutcome::Stale);
        }

        let prefab = match result {
            Ok(prefab) => prefab,
            Err(source) => {
                let err = Error::Load {
                    target: LoadTarget::Slot(slot.clone()),
                    locator,
                    source,
                };
                return Err(self.fail_slot(&slot, token, err));
            }
        };

        match self
            .assemble_part(&slot, &prefab)
            .map_err(|err| err.in_context(LoadTarget::Slot(slot.clone()), &locator))
        {
            Ok((fragment, report)) => {
                log::info!(
                    "Slot '{}' <- '{}': {} mesh(es) rebound, {} unmatched bone(s)",
                    slot,
                    locator,
                    report.rebound_meshes,
                    report.warnings.len()
                );
                let occupant = SlotOccupant::new(fragment)
                    .with_locator(locator)
                    .with_report(report.clone());
                self.slots.attach(&mut self.scene, &slot, occupant)?;
                Ok(SlotOutcome::Applied(report))
            }
            Err(err) => Err(self.fail_slot(&slot, token, err)),
        }
    }

    /// Clones and rebinds a part. The fragment is released again on error.
    fn assemble_part(&mut self, slot: &str, prefab: &SharedPrefab) -> Result<(Fragment, RebindReport)> {
        let Some(base) = &self.base else {
            return Err(Error::NoBaseSkeleton {
                slot: slot.to_string(),
            });
        };

        let fragment = self.scene.instantiate(prefab)?;
        match rebind(&mut self.scene, &fragment, &base.index) {
            Ok(report) => Ok((fragment, report)),
            Err(err) => {
                self.scene.release_fragment(&fragment);
                Err(err)
            }
        }
    }

    fn fail_slot(&mut self, slot: &str, token: u64, err: Error) -> Error {
        log::error!("{err}");
        self.slots.mark_failed(slot, token, err.to_string());
        err
    }

    /// Empties one slot and supersedes any request in flight for it.
    pub fn clear_slot(&mut self, key: &str) -> Result<()> {
        self.slots.clear(&mut self.scene, key)
    }

    pub fn clear_all_slots(&mut self) {
        self.slots.clear_all(&mut self.scene);
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Refreshes world and joint matrices.
    pub fn update(&mut self) {
        self.scene.update();
    }

    /// World bounds of the base and every part, for camera framing.
    pub fn bounds(&mut self) -> Option<BoundingBox> {
        self.scene.update();
        self.scene.compute_bounds(self.root)
    }
}
