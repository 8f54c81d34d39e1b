//! Redundant state elimination.
//!
//! The [`StateCache`] remembers the last value written to every cacheable
//! device slot together with the cache epoch it was written in. A write whose
//! value matches an entry stamped with the current epoch is a provable no-op
//! and is skipped. Bumping the epoch marks every entry unknown in O(1); slots
//! revalidate lazily on their next write.

use crate::types::{
    BufferHandle, RenderStateType, ShaderHandle, StreamBinding, TextureHandle, VertexDeclHandle,
};

/// Number of cached render states.
pub const MAX_RENDER_STATES: u32 = 256;
/// Number of texture stages with cached stage state.
pub const MAX_TEXTURE_STAGES: u32 = 8;
/// Number of cached state types per texture stage.
pub const MAX_TEXTURE_STAGE_STATES: u32 = 33;
/// Number of samplers with cached sampler state and texture bindings.
pub const MAX_SAMPLERS: u32 = 20;
/// Number of cached state types per sampler.
pub const MAX_SAMPLER_STATES: u32 = 14;
/// Number of cached vertex streams.
pub const MAX_STREAMS: u32 = 16;

const RENDER_STATE_BASE: usize = 0;
const TEXTURE_STAGE_BASE: usize = RENDER_STATE_BASE + MAX_RENDER_STATES as usize;
const SAMPLER_STATE_BASE: usize =
    TEXTURE_STAGE_BASE + (MAX_TEXTURE_STAGES * MAX_TEXTURE_STAGE_STATES) as usize;
const TEXTURE_BASE: usize = SAMPLER_STATE_BASE + (MAX_SAMPLERS * MAX_SAMPLER_STATES) as usize;
const VERTEX_SHADER_SLOT: usize = TEXTURE_BASE + MAX_SAMPLERS as usize;
const PIXEL_SHADER_SLOT: usize = VERTEX_SHADER_SLOT + 1;
const VERTEX_DECL_SLOT: usize = PIXEL_SHADER_SLOT + 1;
const INDICES_SLOT: usize = VERTEX_DECL_SLOT + 1;
const STREAM_BASE: usize = INDICES_SLOT + 1;
const SLOT_COUNT: usize = STREAM_BASE + MAX_STREAMS as usize;

/// A cacheable device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSlot {
    RenderState(RenderStateType),
    TextureStageState { stage: u32, state: u32 },
    SamplerState { sampler: u32, state: u32 },
    Texture(u32),
    VertexShader,
    PixelShader,
    VertexDeclaration,
    Indices,
    StreamSource(u32),
}

impl StateSlot {
    /// Flat table index, or `None` when the slot lies outside the cached
    /// range. Uncached slots always reach the device.
    pub fn index(self) -> Option<usize> {
        let index = match self {
            Self::RenderState(state) => {
                if state.0 >= MAX_RENDER_STATES {
                    return None;
                }
                RENDER_STATE_BASE + state.0 as usize
            }
            Self::TextureStageState { stage, state } => {
                if stage >= MAX_TEXTURE_STAGES || state >= MAX_TEXTURE_STAGE_STATES {
                    return None;
                }
                TEXTURE_STAGE_BASE + (stage * MAX_TEXTURE_STAGE_STATES + state) as usize
            }
            Self::SamplerState { sampler, state } => {
                if sampler >= MAX_SAMPLERS || state >= MAX_SAMPLER_STATES {
                    return None;
                }
                SAMPLER_STATE_BASE + (sampler * MAX_SAMPLER_STATES + state) as usize
            }
            Self::Texture(stage) => {
                if stage >= MAX_SAMPLERS {
                    return None;
                }
                TEXTURE_BASE + stage as usize
            }
            Self::VertexShader => VERTEX_SHADER_SLOT,
            Self::PixelShader => PIXEL_SHADER_SLOT,
            Self::VertexDeclaration => VERTEX_DECL_SLOT,
            Self::Indices => INDICES_SLOT,
            Self::StreamSource(stream) => {
                if stream >= MAX_STREAMS {
                    return None;
                }
                STREAM_BASE + stream as usize
            }
        };
        Some(index)
    }
}

/// Value stored in a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateValue {
    Dword(u32),
    Texture(Option<TextureHandle>),
    Shader(Option<ShaderHandle>),
    Declaration(Option<VertexDeclHandle>),
    Buffer(Option<BufferHandle>),
    Stream(StreamBinding),
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: StateValue,
    generation: u32,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            value: StateValue::Dword(0),
            generation: 0,
        }
    }
}

/// Flat `slot -> last known value` tables.
pub struct StateCache {
    entries: Box<[CacheEntry]>,
    epoch: u32,
    hits: u64,
    misses: u64,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            entries: vec![CacheEntry::default(); SLOT_COUNT].into_boxed_slice(),
            epoch: 1,
            hits: 0,
            misses: 0,
        }
    }

    /// Record `value` for `slot`.
    ///
    /// Returns `false` when the slot is known to hold `value` already, in
    /// which case the device call must be skipped.
    pub fn try_set(&mut self, slot: StateSlot, value: StateValue) -> bool {
        let Some(index) = slot.index() else {
            self.misses += 1;
            return true;
        };
        let entry = &mut self.entries[index];
        if entry.generation == self.epoch && entry.value == value {
            self.hits += 1;
            return false;
        }
        entry.value = value;
        entry.generation = self.epoch;
        self.misses += 1;
        true
    }

    /// The value of `slot`, if it is known in the current epoch.
    pub fn get(&self, slot: StateSlot) -> Option<StateValue> {
        let entry = &self.entries[slot.index()?];
        (entry.generation == self.epoch).then_some(entry.value)
    }

    /// Forget a single slot, e.g. after the device rejected a write to it.
    pub fn forget(&mut self, slot: StateSlot) {
        if let Some(index) = slot.index() {
            self.entries[index].generation = 0;
        }
    }

    /// Mark every slot unknown.
    pub fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Stale stamps could collide with a wrapped epoch.
            self.entries.fill(CacheEntry::default());
            self.epoch = 1;
        }
        log::debug!("StateCache: invalidated, epoch {}", self.epoch);
    }

    /// Current cache epoch.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of writes elided so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of writes that reached the device so far.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CULL: StateSlot = StateSlot::RenderState(RenderStateType::CULLMODE);

    #[test]
    fn test_first_write_applies() {
        let mut cache = StateCache::new();
        assert!(cache.try_set(CULL, StateValue::Dword(1)));
        assert!(!cache.try_set(CULL, StateValue::Dword(1)));
        assert!(cache.try_set(CULL, StateValue::Dword(2)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_invalidate_revalidates_lazily() {
        let mut cache = StateCache::new();
        cache.try_set(CULL, StateValue::Dword(3));
        assert_eq!(cache.get(CULL), Some(StateValue::Dword(3)));

        cache.invalidate();
        assert_eq!(cache.get(CULL), None);
        assert!(cache.try_set(CULL, StateValue::Dword(3)));
        assert!(!cache.try_set(CULL, StateValue::Dword(3)));
    }

    #[test]
    fn test_forget_single_slot() {
        let mut cache = StateCache::new();
        let other = StateSlot::RenderState(RenderStateType::ZENABLE);
        cache.try_set(CULL, StateValue::Dword(1));
        cache.try_set(other, StateValue::Dword(1));
        cache.forget(CULL);
        assert!(cache.try_set(CULL, StateValue::Dword(1)));
        assert!(!cache.try_set(other, StateValue::Dword(1)));
    }

    #[test]
    fn test_epoch_wrap_clears_entries() {
        let mut cache = StateCache::new();
        cache.try_set(CULL, StateValue::Dword(1));
        cache.epoch = u32::MAX;
        cache.invalidate();
        assert_eq!(cache.epoch(), 1);
        assert!(cache.try_set(CULL, StateValue::Dword(1)));
    }

    #[rstest]
    #[case::render_state(StateSlot::RenderState(RenderStateType(MAX_RENDER_STATES)))]
    #[case::stage(StateSlot::TextureStageState { stage: MAX_TEXTURE_STAGES, state: 0 })]
    #[case::sampler(StateSlot::SamplerState { sampler: 0, state: MAX_SAMPLER_STATES })]
    #[case::texture(StateSlot::Texture(MAX_SAMPLERS))]
    #[case::stream(StateSlot::StreamSource(MAX_STREAMS))]
    fn test_out_of_range_slots_always_apply(#[case] slot: StateSlot) {
        let mut cache = StateCache::new();
        assert_eq!(slot.index(), None);
        assert!(cache.try_set(slot, StateValue::Dword(5)));
        assert!(cache.try_set(slot, StateValue::Dword(5)));
    }

    #[test]
    fn test_slot_indices_are_distinct() {
        let slots = [
            StateSlot::RenderState(RenderStateType(MAX_RENDER_STATES - 1)),
            StateSlot::TextureStageState { stage: 0, state: 0 },
            StateSlot::TextureStageState {
                stage: MAX_TEXTURE_STAGES - 1,
                state: MAX_TEXTURE_STAGE_STATES - 1,
            },
            StateSlot::SamplerState { sampler: 0, state: 0 },
            StateSlot::Texture(0),
            StateSlot::VertexShader,
            StateSlot::PixelShader,
            StateSlot::VertexDeclaration,
            StateSlot::Indices,
            StateSlot::StreamSource(MAX_STREAMS - 1),
        ];
        let mut seen = std::collections::HashSet::new();
        for slot in slots {
            let index = slot.index().unwrap();
            assert!(index < SLOT_COUNT);
            assert!(seen.insert(index), "duplicate index for {:?}", slot);
        }
    }
}
