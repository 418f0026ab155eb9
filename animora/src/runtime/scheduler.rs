use crate::runtime::entry::EntryHandle;
use crate::runtime::player::AnimationPlayer;
use crate::runtime::property::PropertyAccess;
use crate::{AnimationItem, AnimationLibrary, Error, ObjectId, PlayerConfig};

/// Frame-loop facade over [`AnimationPlayer`] that works in milliseconds.
pub struct AnimationScheduler {
    player: AnimationPlayer,
}

impl AnimationScheduler {
    pub fn new(library: AnimationLibrary) -> Self {
        Self {
            player: AnimationPlayer::new(library),
        }
    }

    pub fn with_config(library: AnimationLibrary, config: PlayerConfig) -> Self {
        Self {
            player: AnimationPlayer::with_config(library, config),
        }
    }

    pub fn player(&self) -> &AnimationPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut AnimationPlayer {
        &mut self.player
    }

    pub fn into_player(self) -> AnimationPlayer {
        self.player
    }

    pub fn attach(
        &mut self,
        item: impl Into<AnimationItem>,
        context: Option<ObjectId>,
        props: &mut dyn PropertyAccess,
    ) -> Result<EntryHandle, Error> {
        self.player.start(item, context, props)
    }

    pub fn detach(
        &mut self,
        handle: EntryHandle,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        self.player.finish(handle, props)
    }

    /// Advances by `elapsed_ms` milliseconds, writing only inside `root_node` when given.
    pub fn update(
        &mut self,
        elapsed_ms: f64,
        root_node: Option<ObjectId>,
        props: &mut dyn PropertyAccess,
    ) -> Result<(), Error> {
        let delta = (elapsed_ms / 1000.0) as f32;
        self.player.update_within(delta, root_node, props)
    }
}
