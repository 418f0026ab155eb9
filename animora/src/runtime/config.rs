use crate::WeightBlendMode;

const DEFAULT_TIME_EPSILON: f32 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub default_blend_mode: WeightBlendMode,
    pub default_weight: f32,
    /// Upper bound on live modifier records; `None` only stops at allocation failure.
    pub max_modifier_records: Option<usize>,
    pub time_epsilon: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_blend_mode: WeightBlendMode::Override,
            default_weight: 1.0,
            max_modifier_records: None,
            time_epsilon: DEFAULT_TIME_EPSILON,
        }
    }
}

impl PlayerConfig {
    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            weight: self.default_weight,
            blend_mode: self.default_blend_mode,
            looped: false,
            time_scale: 1.0,
        }
    }
}

/// Per-start playback settings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StartOptions {
    pub weight: f32,
    pub blend_mode: WeightBlendMode,
    pub looped: bool,
    pub time_scale: f32,
}

impl Default for StartOptions {
    fn default() -> Self {
        PlayerConfig::default().start_options()
    }
}

impl StartOptions {
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn blend_mode(mut self, blend_mode: WeightBlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn additive(self) -> Self {
        self.blend_mode(WeightBlendMode::Additive)
    }

    pub fn time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }
}
