//! Provides a struct [`DrumChannel`]: one trigger/gate/velocity output advanced by the periodic tick.

use wmidi::U7;

/// Number of drum channels. The first [`EVENT_DRUM_COUNT`] are struck by notes; the rest follow the MIDI clock.
pub const DRUM_CHANNEL_COUNT: usize = 8;

/// Number of drum channels driven by Note On/Off events.
pub const EVENT_DRUM_COUNT: usize = 4;

/// An independent trigger/gate channel.
///
/// [`trigger`](Self::trigger) is a short pulse: it goes high when the channel is struck and falls after a fixed
/// number of ticks (one by default, so a render between the strike and the next tick sees it exactly once).
/// [`gate`](Self::gate) stays high until the channel is stopped or, if configured, until its auto-stop duration
/// elapses.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrumChannel {
    /// Ticks left before the trigger pulse falls.
    trigger_remaining: u16,
    gate: bool,
    /// Ticks left before the gate stops by itself, when auto-stop is configured.
    gate_remaining: Option<u16>,
    velocity: u8,
    /// Width of the trigger pulse in ticks.
    trigger_ticks: u16,
    /// Length of the gate in ticks, or `None` to hold it until [`stop`](Self::stop).
    gate_ticks: Option<u16>,
}

impl Default for DrumChannel {
    fn default() -> Self {
        Self::new(1, None)
    }
}

impl DrumChannel {
    /// Construct a stopped `DrumChannel`. A pulse width of zero ticks is widened to one.
    pub fn new(trigger_ticks: u16, gate_ticks: Option<u16>) -> Self {
        Self {
            trigger_remaining: 0,
            gate: false,
            gate_remaining: None,
            velocity: 0,
            trigger_ticks: trigger_ticks.max(1),
            gate_ticks,
        }
    }

    /// Strike the channel: raises both the trigger pulse and the gate and latches the velocity.
    pub fn trigger_with(&mut self, velocity: U7) {
        self.trigger_remaining = self.trigger_ticks;
        self.gate = true;
        self.gate_remaining = self.gate_ticks;
        self.velocity = u8::from(velocity);
    }

    /// Lower the gate. A trigger pulse in flight is left to the tick.
    pub fn stop(&mut self) {
        self.gate = false;
        self.gate_remaining = None;
    }

    /// Advance by one tick: shortens the trigger pulse and, if configured, counts down the gate.
    pub fn tick(&mut self) {
        self.trigger_remaining = self.trigger_remaining.saturating_sub(1);
        if let Some(remaining) = self.gate_remaining {
            match remaining.saturating_sub(1) {
                0 => self.stop(),
                left => self.gate_remaining = Some(left),
            }
        }
    }

    /// Whether the trigger pulse is high.
    pub fn trigger(&self) -> bool {
        self.trigger_remaining != 0
    }

    /// Whether the gate is high.
    pub fn gate(&self) -> bool {
        self.gate
    }

    /// Velocity of the last strike.
    pub fn velocity(&self) -> U7 {
        U7::from_u8_lossy(self.velocity)
    }
}
