use rustc_hash::FxHashMap;

use crate::character::rebind::RebindReport;
use crate::errors::{Error, Result};
use crate::scene::{Fragment, NodeHandle, Scene};

/// Observable state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotStatus {
    #[default]
    Empty,
    /// A request is in flight.
    Loading,
    Occupied,
    /// The latest request failed. A previous occupant, if any, is still attached.
    Failed,
}

/// What currently fills a slot.
#[derive(Debug, Clone)]
pub struct SlotOccupant {
    pub fragment: Fragment,
    /// Source the part was loaded from (empty if attached directly).
    pub locator: String,
    pub report: RebindReport,
}

impl SlotOccupant {
    #[must_use]
    pub fn new(fragment: Fragment) -> Self {
        Self {
            fragment,
            locator: String::new(),
            report: RebindReport::default(),
        }
    }

    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = locator.into();
        self
    }

    #[must_use]
    pub fn with_report(mut self, report: RebindReport) -> Self {
        self.report = report;
        self
    }
}

impl From<Fragment> for SlotOccupant {
    fn from(fragment: Fragment) -> Self {
        Self::new(fragment)
    }
}

#[derive(Debug)]
struct Slot {
    key: String,
    anchor: NodeHandle,
    occupant: Option<SlotOccupant>,
    status: SlotStatus,
    /// Status to fall back to when an in-flight request is abandoned.
    settled: SlotStatus,
    latest_token: u64,
    last_error: Option<String>,
}

/// Fixed set of named attachment points under a character root.
///
/// Each slot owns an anchor node; an attached fragment hangs under it. Keys
/// are fixed at construction and keep their declaration order.
#[derive(Debug)]
pub struct SlotRegistry {
    slots: Vec<Slot>,
    lookup: FxHashMap<String, usize>,
}

impl SlotRegistry {
    /// Creates one anchor node per key under `parent`. Repeated keys are ignored.
    pub fn new<S: AsRef<str>>(scene: &mut Scene, parent: NodeHandle, keys: &[S]) -> Self {
        let mut registry = Self {
            slots: Vec::with_capacity(keys.len()),
            lookup: FxHashMap::default(),
        };

        for key in keys {
            let key = key.as_ref();
            if registry.lookup.contains_key(key) {
                log::warn!("Slot '{key}' declared twice; keeping the first");
                continue;
            }
            let anchor = scene.create_node_with_name(&format!("slot:{key}"));
            scene.attach(anchor, parent);

            registry.lookup.insert(key.to_string(), registry.slots.len());
            registry.slots.push(Slot {
                key: key.to_string(),
                anchor,
                occupant: None,
                status: SlotStatus::Empty,
                settled: SlotStatus::Empty,
                latest_token: 0,
                last_error: None,
            });
        }

        registry
    }

    fn slot(&self, key: &str) -> Result<&Slot> {
        self.lookup
            .get(key)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| Error::UnknownSlot {
                slot: key.to_string(),
            })
    }

    fn slot_mut(&mut self, key: &str) -> Result<&mut Slot> {
        match self.lookup.get(key) {
            Some(&i) => Ok(&mut self.slots[i]),
            None => Err(Error::UnknownSlot {
                slot: key.to_string(),
            }),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.key.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lookup.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status(&self, key: &str) -> Result<SlotStatus> {
        Ok(self.slot(key)?.status)
    }

    /// `(key, status)` for every slot, in declaration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(&str, SlotStatus)> {
        self.slots
            .iter()
            .map(|s| (s.key.as_str(), s.status))
            .collect()
    }

    pub fn occupant(&self, key: &str) -> Result<Option<&SlotOccupant>> {
        Ok(self.slot(key)?.occupant.as_ref())
    }

    pub fn anchor(&self, key: &str) -> Result<NodeHandle> {
        Ok(self.slot(key)?.anchor)
    }

    /// Message of the most recent failure, cleared by the next success.
    pub fn last_error(&self, key: &str) -> Result<Option<&str>> {
        Ok(self.slot(key)?.last_error.as_deref())
    }

    // ========================================================================
    // Attach / clear
    // ========================================================================

    /// Replaces the slot's content with `occupant`.
    ///
    /// The previous occupant is released first; the new fragment is moved
    /// under the slot anchor.
    pub fn attach(
        &mut self,
        scene: &mut Scene,
        key: &str,
        occupant: impl Into<SlotOccupant>,
    ) -> Result<()> {
        let occupant = occupant.into();
        let slot = self.slot_mut(key)?;

        if let Some(previous) = slot.occupant.take() {
            scene.release_fragment(&previous.fragment);
        }

        scene.attach(occupant.fragment.root, slot.anchor);
        slot.occupant = Some(occupant);
        slot.status = SlotStatus::Occupied;
        slot.settled = SlotStatus::Occupied;
        slot.last_error = None;
        Ok(())
    }

    /// Empties the slot. Clearing an empty slot is a no-op.
    ///
    /// Also supersedes any request still in flight for this slot.
    pub fn clear(&mut self, scene: &mut Scene, key: &str) -> Result<()> {
        let slot = self.slot_mut(key)?;
        slot.latest_token += 1;

        if let Some(previous) = slot.occupant.take() {
            scene.release_fragment(&previous.fragment);
            log::debug!("Cleared slot '{key}'");
        }
        slot.status = SlotStatus::Empty;
        slot.settled = SlotStatus::Empty;
        slot.last_error = None;
        Ok(())
    }

    pub fn clear_all(&mut self, scene: &mut Scene) {
        for slot in &mut self.slots {
            slot.latest_token += 1;
            if let Some(previous) = slot.occupant.take() {
                scene.release_fragment(&previous.fragment);
            }
            slot.status = SlotStatus::Empty;
            slot.settled = SlotStatus::Empty;
            slot.last_error = None;
        }
    }

    // ========================================================================
    // Request tokens
    // ========================================================================

    /// Issues a new request token for `key` and marks the slot `Loading`.
    /// Any earlier token for the slot becomes stale.
    pub fn begin_request(&mut self, key: &str) -> Result<u64> {
        let slot = self.slot_mut(key)?;
        slot.latest_token += 1;
        if slot.status != SlotStatus::Loading {
            slot.settled = slot.status;
        }
        slot.status = SlotStatus::Loading;
        Ok(slot.latest_token)
    }

    /// Drops request `token` without a result.
    ///
    /// If it was still the latest request the slot goes back to the status it
    /// had before loading began, and the token is retired. Stale tokens are
    /// ignored.
    pub fn abandon(&mut self, key: &str, token: u64) {
        if let Ok(slot) = self.slot_mut(key)
            && slot.latest_token == token
        {
            slot.latest_token += 1;
            slot.status = slot.settled;
        }
    }

    /// Whether `token` is still the latest request for `key`.
    #[must_use]
    pub fn is_current(&self, key: &str, token: u64) -> bool {
        self.slot(key).is_ok_and(|s| s.latest_token == token)
    }

    /// Records a failed request. Ignored if `token` is stale.
    pub fn mark_failed(&mut self, key: &str, token: u64, message: impl Into<String>) {
        if let Ok(slot) = self.slot_mut(key)
            && slot.latest_token == token
        {
            slot.status = SlotStatus::Failed;
            slot.settled = SlotStatus::Failed;
            slot.last_error = Some(message.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_supersede_each_other() {
        let mut scene = Scene::new();
        let root = scene.create_node_with_name("root");
        let mut slots = SlotRegistry::new(&mut scene, root, &["helmet"]);

        let first = slots.begin_request("helmet").unwrap();
        let second = slots.begin_request("helmet").unwrap();

        assert!(!slots.is_current("helmet", first));
        assert!(slots.is_current("helmet", second));
        assert_eq!(slots.status("helmet").unwrap(), SlotStatus::Loading);

        slots.mark_failed("helmet", first, "late failure");
        assert_eq!(slots.status("helmet").unwrap(), SlotStatus::Loading);

        slots.clear(&mut scene, "helmet").unwrap();
        assert!(!slots.is_current("helmet", second));
        assert_eq!(slots.status("helmet").unwrap(), SlotStatus::Empty);
    }

    #[test]
    fn abandoned_request_restores_settled_status() {
        let mut scene = Scene::new();
        let root = scene.create_node();
        let mut slots = SlotRegistry::new(&mut scene, root, &["mask"]);

        let stale = slots.begin_request("mask").unwrap();
        let latest = slots.begin_request("mask").unwrap();
        slots.abandon("mask", stale);
        assert_eq!(slots.status("mask").unwrap(), SlotStatus::Loading);

        slots.abandon("mask", latest);
        assert_eq!(slots.status("mask").unwrap(), SlotStatus::Empty);
        assert!(!slots.is_current("mask", latest));

        let failing = slots.begin_request("mask").unwrap();
        slots.mark_failed("mask", failing, "missing");
        let retry = slots.begin_request("mask").unwrap();
        slots.abandon("mask", retry);
        assert_eq!(slots.status("mask").unwrap(), SlotStatus::Failed);
    }

    #[test]
    fn duplicate_keys_are_collapsed() {
        let mut scene = Scene::new();
        let root = scene.create_node();
        let slots = SlotRegistry::new(&mut scene, root, &["mask", "mask", "shoes"]);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.keys().collect::<Vec<_>>(), vec!["mask", "shoes"]);
    }
}
