/// Telemetry fan-out from the playback thread.
///
/// The loop is the single writer. Every subscriber gets its own unbounded
/// queue, so a slow consumer only grows its own backlog and never stalls the
/// producer. Subscribers that dropped their receiver are pruned on the next
/// publish.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// Why a session ended. Exactly one `TrackEnded` is published per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The decoder ran out of frames.
    Finished,
    /// `stop()` was requested (including the implicit stop of a new `load`).
    Stopped,
    /// A decode or device error cut the session short.
    Failed,
}

/// Copy of one written block. Shared immutably between subscribers.
#[derive(Clone, Debug)]
pub struct AudioBlock {
    pub channels: u16,
    pub samples: Arc<[f32]>,
}

impl AudioBlock {
    pub fn new(channels: u16, samples: &[f32]) -> Self {
        Self {
            channels,
            samples: Arc::from(samples),
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Samples of the first channel.
    pub fn first_channel(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .step_by(self.channels.max(1) as usize)
            .copied()
    }
}

#[derive(Clone, Debug)]
pub enum PlayerEvent {
    /// Frame offset of the decoder after a written block or an applied seek.
    Position(u64),
    Block(AudioBlock),
    TrackEnded(EndReason),
}

/// Which events a subscriber wants queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interest {
    pub positions: bool,
    pub blocks: bool,
    pub lifecycle: bool,
}

impl Interest {
    pub const ALL: Interest = Interest {
        positions: true,
        blocks: true,
        lifecycle: true,
    };
    pub const POSITIONS: Interest = Interest {
        positions: true,
        blocks: false,
        lifecycle: false,
    };
    pub const BLOCKS: Interest = Interest {
        positions: false,
        blocks: true,
        lifecycle: false,
    };
    pub const LIFECYCLE: Interest = Interest {
        positions: false,
        blocks: false,
        lifecycle: true,
    };

    fn wants(&self, event: &PlayerEvent) -> bool {
        match event {
            PlayerEvent::Position(_) => self.positions,
            PlayerEvent::Block(_) => self.blocks,
            PlayerEvent::TrackEnded(_) => self.lifecycle,
        }
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest {
            positions: self.positions || rhs.positions,
            blocks: self.blocks || rhs.blocks,
            lifecycle: self.lifecycle || rhs.lifecycle,
        }
    }
}

struct Subscriber {
    tx: Sender<PlayerEvent>,
    interest: Interest,
}

#[derive(Clone, Default)]
pub struct Telemetry {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, interest: Interest) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(Subscriber { tx, interest });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn publish(&self, event: PlayerEvent) {
        let mut subs = self.subscribers.lock();
        // An unbounded send only fails once the receiver is gone.
        subs.retain(|sub| !sub.interest.wants(&event) || sub.tx.send(event.clone()).is_ok());
    }
}
