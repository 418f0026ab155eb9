mod animation;
mod clip;
mod compose;
mod config;
mod entry;
mod events;
mod modifier;
mod player;
mod property;
mod scheduler;
mod sequence;

pub use clip::ClipSample;
pub use compose::{AnimationSample, compose_animation_samples};
pub use config::{PlayerConfig, StartOptions};
pub use entry::{EntryHandle, EntryState, TimelineEntry};
pub use events::{Commands, EntrySnapshot, PlaybackEvent, PlaybackListener};
pub use modifier::ModifierRecord;
pub use player::{AnimationPlayer, EntryInfo};
pub use property::PropertyAccess;
pub use scheduler::AnimationScheduler;

#[cfg(test)]
pub(crate) mod test_scene;






#[cfg(test)]
mod player_tests;
