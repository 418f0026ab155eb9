use crate::runtime::entry::EntryHandle;
use crate::{AnimationId, ClipId, ModifierKey};

/// A single value one entry wants to write this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationSample {
    pub value: f32,
    pub entry: EntryHandle,
    pub animation: AnimationId,
    pub clip: Option<ClipId>,
    /// Entry time the sample was taken at.
    pub relative_time: f32,
    /// Time on the animation curve.
    pub time: f32,
    pub is_relative: bool,
    pub weight: f32,
    pub priority: u64,
    pub target: ModifierKey,
    pub consumed: bool,
    /// Target went away after the sample was produced; it keeps its slot but contributes nothing.
    pub invalid_multi_sample: bool,
}

impl AnimationSample {
    fn contributes(&self) -> bool {
        !self.invalid_multi_sample && self.weight.is_finite()
    }
}

/// Folds every sample aimed at one attribute into a single value.
///
/// Override samples are applied in ascending priority, each blending from the running value
/// by its weight; a weight of 1 or more replaces outright. Additive samples then add
/// `value * weight` on top. Contributing samples are marked `consumed`. Returns `None` when no
/// sample contributed.
pub fn compose_animation_samples(base: f32, samples: &mut [AnimationSample]) -> Option<f32> {
    samples.sort_by_key(|s| s.priority);

    let mut value = base;
    let mut any = false;

    for sample in samples
        .iter_mut()
        .filter(|s| !s.is_relative && s.contributes())
    {
        value = if sample.weight >= 1.0 {
            sample.value
        } else {
            value + (sample.value - value) * sample.weight.max(0.0)
        };
        sample.consumed = true;
        any = true;
    }

    for sample in samples
        .iter_mut()
        .filter(|s| s.is_relative && s.contributes())
    {
        value += sample.value * sample.weight;
        sample.consumed = true;
        any = true;
    }

    any.then_some(value)
}
