use crate::runtime::entry::EntryHandle;
use crate::{AnimationItem, ObjectId, StartOptions};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    Start,
    /// A non-looping entry reached the end of its item.
    Complete,
    End,
    /// Last event of an entry; its handle is dead afterwards.
    Dispose,
}

/// What a listener sees of the entry an event belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct EntrySnapshot {
    pub handle: EntryHandle,
    pub item: AnimationItem,
    pub item_name: String,
    pub relative_time: f32,
    pub context_object: Option<ObjectId>,
    /// Enclosing sequence entry, for sequence members.
    pub owner: Option<EntryHandle>,
}

/// Receives lifecycle events after each update.
///
/// Listeners never touch the player directly; anything they want done goes through
/// [`Commands`] and is applied once the current event batch has been delivered.
pub trait PlaybackListener {
    fn on_event(&mut self, commands: &mut Commands, entry: &EntrySnapshot, event: &PlaybackEvent);
}

impl<F> PlaybackListener for F
where
    F: FnMut(&mut Commands, &EntrySnapshot, &PlaybackEvent),
{
    fn on_event(&mut self, commands: &mut Commands, entry: &EntrySnapshot, event: &PlaybackEvent) {
        self(commands, entry, event)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    Start {
        item: AnimationItem,
        context: Option<ObjectId>,
        options: Option<StartOptions>,
    },
    Finish(EntryHandle),
    FinishAll,
}

/// Deferred player operations requested from a listener.
#[derive(Debug, Default)]
pub struct Commands {
    pub(crate) queue: Vec<Command>,
}

impl Commands {
    pub fn start(&mut self, item: impl Into<AnimationItem>, context: Option<ObjectId>) {
        self.queue.push(Command::Start {
            item: item.into(),
            context,
            options: None,
        });
    }

    pub fn start_with(
        &mut self,
        item: impl Into<AnimationItem>,
        context: Option<ObjectId>,
        options: StartOptions,
    ) {
        self.queue.push(Command::Start {
            item: item.into(),
            context,
            options: Some(options),
        });
    }

    pub fn finish(&mut self, handle: EntryHandle) {
        self.queue.push(Command::Finish(handle));
    }

    pub fn finish_all(&mut self) {
        self.queue.push(Command::FinishAll);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct QueuedEvent {
    pub(crate) entry: crate::runtime::entry::EntryId,
    pub(crate) event: PlaybackEvent,
}
