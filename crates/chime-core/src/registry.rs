//! Identifier → sound map with creation order.

use std::collections::HashMap;

use crate::backend::BackendAdapter;
use crate::config::SoundDefaults;
use crate::error::{Error, Result};
use crate::models::SoundOptions;
use crate::sound::{SoundContext, SoundHandle};

/// Result of a best-effort operation over many sounds.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub failed: Vec<(String, Error)>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
pub struct SoundRegistry {
    sounds: HashMap<String, SoundHandle>,
    order: Vec<String>,
}

impl SoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create(
        &mut self,
        opts: &SoundOptions,
        adapter: Box<dyn BackendAdapter>,
        ctx: SoundContext,
        defaults: &SoundDefaults,
    ) -> Result<&mut SoundHandle> {
        opts.validate()?;
        if self.contains(&opts.id) {
            return Err(Error::DuplicateIdentifier(opts.id.clone()));
        }
        // A destroyed handle awaiting pruning may still hold the id.
        self.remove_entry(&opts.id);

        self.order.push(opts.id.clone());
        let handle = SoundHandle::new(opts, defaults, adapter, ctx);
        Ok(self.sounds.entry(opts.id.clone()).or_insert(handle))
    }

    pub fn get(&self, id: &str) -> Option<&SoundHandle> {
        self.sounds.get(id).filter(|s| !s.is_destroyed())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SoundHandle> {
        self.sounds.get_mut(id).filter(|s| !s.is_destroyed())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Destroy and remove a sound.
    pub fn destroy(&mut self, id: &str) -> Result<()> {
        let sound = self
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        sound.destroy();
        self.remove_entry(id);
        Ok(())
    }

    /// Live sound ids in creation order.
    pub fn ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.contains(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.values().filter(|s| !s.is_destroyed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit live sounds in creation order.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut SoundHandle)) {
        for id in &self.order {
            if let Some(sound) = self.sounds.get_mut(id).filter(|s| !s.is_destroyed()) {
                f(sound);
            }
        }
    }

    /// Apply `op` to every live sound in creation order; a failure on one
    /// sound never stops the rest.
    pub fn try_each(&mut self, mut op: impl FnMut(&mut SoundHandle) -> Result<()>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        self.for_each(|sound| match op(sound) {
            Ok(()) => outcome.applied += 1,
            Err(e) => outcome.failed.push((sound.id().to_string(), e)),
        });
        outcome
    }

    /// Drop entries whose handle was destroyed in place.
    pub(crate) fn prune_destroyed(&mut self) {
        if self.sounds.values().all(|s| !s.is_destroyed()) {
            return;
        }
        self.sounds.retain(|_, s| !s.is_destroyed());
        let sounds = &self.sounds;
        self.order.retain(|id| sounds.contains_key(id));
    }

    /// Destroy every sound and empty the registry.
    pub fn destroy_all(&mut self) {
        for id in std::mem::take(&mut self.order) {
            if let Some(mut sound) = self.sounds.remove(&id) {
                sound.destroy();
            }
        }
        self.sounds.clear();
    }

    fn remove_entry(&mut self, id: &str) {
        if self.sounds.remove(id).is_some() {
            self.order.retain(|o| o != id);
        }
    }
}
