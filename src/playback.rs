//! Feed-wide playback coordination.
//!
//! Each mounted feed position owns a [`MediaPlayer`]. The controller is the
//! only place that decides which of them plays, so the at-most-one-playing
//! rule holds across fast index transitions and late player callbacks.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::PlaybackError;

/// Handle to the media surface of one mounted item.
pub trait MediaPlayer {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self) -> Result<(), PlaybackError>;
    fn seek_to_start(&mut self) -> Result<(), PlaybackError>;
    /// Restarts loading after a failure. The player signals ready again.
    fn reload(&mut self) -> Result<(), PlaybackError>;
    fn release(&mut self);
}

/// Lifecycle of a mounted item. Unmounted items have no phase at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerPhase {
    Loading,
    Ready,
    Playing,
    Paused,
    /// Load or playback failed; the item shows a retry control.
    Errored { message: String },
}

impl PlayerPhase {
    pub fn is_ready(&self) -> bool {
        !matches!(self, PlayerPhase::Loading)
    }

    fn is_playable(&self) -> bool {
        matches!(
            self,
            PlayerPhase::Ready | PlayerPhase::Playing | PlayerPhase::Paused
        )
    }
}

/// Identifies one mount of one index. Callbacks carrying a token from an
/// earlier mount are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountToken {
    pub index: usize,
    generation: u64,
}

/// Snapshot handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub index: usize,
    pub is_active: bool,
    pub is_user_paused: bool,
    pub is_ready: bool,
    pub phase: PlayerPhase,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.phase == PlayerPhase::Playing
    }
}

struct Slot {
    generation: u64,
    phase: PlayerPhase,
    user_paused: bool,
    player: Box<dyn MediaPlayer>,
}

#[derive(Default)]
pub struct PlaybackController {
    slots: HashMap<usize, Slot>,
    active: Option<usize>,
    next_generation: u64,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the player of a newly mounted position. A previous mount of
    /// the same index is released first.
    pub fn mount(&mut self, index: usize, player: Box<dyn MediaPlayer>) -> MountToken {
        self.unmount(index);
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slots.insert(
            index,
            Slot {
                generation,
                phase: PlayerPhase::Loading,
                user_paused: false,
                player,
            },
        );
        MountToken { index, generation }
    }

    pub fn unmount(&mut self, index: usize) -> bool {
        match self.slots.remove(&index) {
            Some(mut slot) => {
                slot.player.release();
                true
            }
            None => false,
        }
    }

    /// Releases every mounted player and forgets the active index.
    pub fn clear(&mut self) {
        for (_, mut slot) in self.slots.drain() {
            slot.player.release();
        }
        self.active = None;
    }

    /// The player finished loading. Starts playback if the item is active.
    pub fn on_ready(&mut self, token: MountToken) -> bool {
        let is_active = self.active == Some(token.index);
        let Some(slot) = self.live_slot(token) else {
            debug!("ignoring ready signal for stale mount of item {}", token.index);
            return false;
        };
        if slot.phase != PlayerPhase::Loading {
            return false;
        }
        slot.phase = PlayerPhase::Ready;
        if is_active && !slot.user_paused {
            self.start(token.index);
        }
        true
    }

    pub fn on_error(&mut self, token: MountToken, error: PlaybackError) -> bool {
        let Some(slot) = self.live_slot(token) else {
            debug!("ignoring media error for stale mount of item {}", token.index);
            return false;
        };
        warn!("item {} playback failed: {error}", token.index);
        slot.phase = PlayerPhase::Errored {
            message: error.to_string(),
        };
        true
    }

    /// Moves an errored item back to loading.
    pub fn retry(&mut self, index: usize) -> bool {
        let Some(slot) = self.slots.get_mut(&index) else {
            return false;
        };
        if !matches!(slot.phase, PlayerPhase::Errored { .. }) {
            return false;
        }
        slot.phase = match slot.player.reload() {
            Ok(()) => PlayerPhase::Loading,
            Err(err) => {
                warn!("item {index} reload failed: {err}");
                PlayerPhase::Errored {
                    message: err.to_string(),
                }
            }
        };
        true
    }

    /// Hands playback to `index`. The previous holder is paused and rewound
    /// before the new item is asked to play.
    pub fn set_active(&mut self, index: usize) {
        let previous = self.active.replace(index);
        if previous == Some(index) {
            return;
        }

        if let Some(previous) = previous {
            self.rewind(previous);
        }
        let stray: Vec<usize> = self
            .slots
            .iter()
            .filter(|(other, slot)| **other != index && slot.phase == PlayerPhase::Playing)
            .map(|(other, _)| *other)
            .collect();
        for other in stray {
            self.rewind(other);
        }

        let Some(slot) = self.slots.get_mut(&index) else {
            return;
        };
        slot.user_paused = false;
        if matches!(slot.phase, PlayerPhase::Ready | PlayerPhase::Paused) {
            self.start(index);
        }
    }

    /// Tap on an item. Only the active item reacts: playing pauses and sets
    /// the manual override, paused resumes and clears it. Returns whether the
    /// item is playing afterwards.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        if self.active != Some(index) {
            return None;
        }
        let slot = self.slots.get_mut(&index)?;
        match slot.phase.clone() {
            PlayerPhase::Playing => {
                match slot.player.pause() {
                    Ok(()) => slot.phase = PlayerPhase::Paused,
                    Err(err) => Self::fail(index, slot, err),
                }
                slot.user_paused = true;
                Some(false)
            }
            PlayerPhase::Ready | PlayerPhase::Paused => {
                slot.user_paused = false;
                Some(self.start(index))
            }
            PlayerPhase::Loading | PlayerPhase::Errored { .. } => None,
        }
    }

    pub fn state(&self, index: usize) -> Option<PlaybackState> {
        let slot = self.slots.get(&index)?;
        Some(PlaybackState {
            index,
            is_active: self.active == Some(index),
            is_user_paused: slot.user_paused,
            is_ready: slot.phase.is_ready(),
            phase: slot.phase.clone(),
        })
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn playing(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.phase == PlayerPhase::Playing)
            .map(|(index, _)| *index)
    }

    pub fn playing_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.phase == PlayerPhase::Playing)
            .count()
    }

    pub fn is_mounted(&self, index: usize) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn mounted_count(&self) -> usize {
        self.slots.len()
    }

    fn live_slot(&mut self, token: MountToken) -> Option<&mut Slot> {
        self.slots
            .get_mut(&token.index)
            .filter(|slot| slot.generation == token.generation)
    }

    fn start(&mut self, index: usize) -> bool {
        let Some(slot) = self.slots.get_mut(&index) else {
            return false;
        };
        match slot.player.play() {
            Ok(()) => {
                slot.phase = PlayerPhase::Playing;
                true
            }
            Err(err) => {
                Self::fail(index, slot, err);
                false
            }
        }
    }

    fn rewind(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(&index) else {
            return;
        };
        if !slot.phase.is_playable() {
            return;
        }
        let result = slot
            .player
            .pause()
            .and_then(|()| slot.player.seek_to_start());
        match result {
            Ok(()) => {
                if slot.phase != PlayerPhase::Ready {
                    slot.phase = PlayerPhase::Paused;
                }
            }
            Err(err) => Self::fail(index, slot, err),
        }
    }

    fn fail(index: usize, slot: &mut Slot, error: PlaybackError) {
        warn!("item {index} playback failed: {error}");
        slot.phase = PlayerPhase::Errored {
            message: error.to_string(),
        };
    }
}
