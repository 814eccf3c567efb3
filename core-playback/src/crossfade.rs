//! # Crossfade Transition Controller
//!
//! Fade-out, swap and snap-back for a single output channel.
//!
//! ## Overview
//!
//! There is only one channel, so a "crossfade" is approximated: the routed
//! volume steps down to zero over the fade length, the next track is swapped
//! in, and after a short settle delay the volume jumps back to where it was.
//!
//! ```text
//! Idle ──begin──▶ FadingOut ──last tick──▶ (swap) ──▶ Settling ──settle──▶ Idle
//!   ▲                 │                                   │
//!   └──── cancel ─────┴──────────────── cancel ───────────┘
//! ```
//!
//! The controller never touches the output itself. Its timers run as
//! [`ScopedTask`]s that post [`TimerEvent`]s into a channel; the owner feeds
//! each event back through [`CrossfadeController::on_tick`] or
//! [`CrossfadeController::on_settle`] and performs whatever those return.
//!
//! Every timer carries the generation it was started under. Cancelling or
//! starting a transition moves the generation on, so events from a retired
//! timer that were already queued are recognised and ignored.

use core_async::sync::mpsc::UnboundedSender;
use core_async::task::ScopedTask;
use core_async::time::{delayed_interval, sleep, Duration};
use core_library::Track;
use tracing::debug;

/// Volumes at or below this count as silent.
const SILENCE: f32 = 1e-4;

/// Timer callbacks delivered to the owner of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    FadeTick { generation: u64 },
    Settle { generation: u64 },
}

impl TimerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::FadeTick { generation } | TimerEvent::Settle { generation } => *generation,
        }
    }
}

/// What the owner must do after a fade tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FadeStep {
    /// Write `volume` to the active route.
    Continue { volume: f32 },
    /// The fade has finished: force the route to 0, swap to `armed`, then
    /// call [`CrossfadeController::begin_settle`] with `original_volume`.
    Swap { armed: Box<Track>, original_volume: f32 },
    /// The event belongs to a retired timer.
    Stale,
}

enum FadeState {
    Idle,
    FadingOut {
        generation: u64,
        original_volume: f32,
        current_volume: f32,
        step: f32,
        steps_remaining: u32,
        armed: Box<Track>,
        _ticker: ScopedTask,
    },
    Settling {
        generation: u64,
        original_volume: f32,
        _timer: ScopedTask,
    },
}

/// Owns the one in-flight transition, if any.
pub struct CrossfadeController {
    steps: u32,
    settle_delay: Duration,
    generation: u64,
    state: FadeState,
    events: UnboundedSender<TimerEvent>,
}

impl CrossfadeController {
    pub fn new(steps: u32, settle_delay: Duration, events: UnboundedSender<TimerEvent>) -> Self {
        Self {
            steps: steps.max(1),
            settle_delay,
            generation: 0,
            state: FadeState::Idle,
            events,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, FadeState::Idle)
    }

    pub fn is_fading(&self) -> bool {
        matches!(self.state, FadeState::FadingOut { .. })
    }

    pub fn is_settling(&self) -> bool {
        matches!(self.state, FadeState::Settling { .. })
    }

    /// Track that will be swapped in when the running fade completes.
    pub fn armed_track(&self) -> Option<&Track> {
        match &self.state {
            FadeState::FadingOut { armed, .. } => Some(armed),
            _ => None,
        }
    }

    /// Volume the route returns to once the transition is over.
    pub fn restore_volume(&self) -> Option<f32> {
        match &self.state {
            FadeState::FadingOut {
                original_volume, ..
            }
            | FadeState::Settling {
                original_volume, ..
            } => Some(*original_volume),
            FadeState::Idle => None,
        }
    }

    /// Change the volume restored at the end of the running transition.
    pub fn set_restore_volume(&mut self, volume: f32) {
        match &mut self.state {
            FadeState::FadingOut {
                original_volume, ..
            }
            | FadeState::Settling {
                original_volume, ..
            } => *original_volume = volume,
            FadeState::Idle => {}
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Retire the running fade or pending snap-back. Returns whether there
    /// was one.
    pub fn cancel(&mut self) -> bool {
        if self.is_idle() {
            return false;
        }
        let generation = self.next_generation();
        self.state = FadeState::Idle;
        debug!(generation, "Transition cancelled");
        true
    }

    /// Start fading out from `original_volume` towards a swap to `armed`.
    ///
    /// Any previous transition is cancelled first. Returns the generation of
    /// the new fade.
    pub fn begin(&mut self, armed: Track, original_volume: f32, fade_seconds: u32) -> u64 {
        self.cancel();
        let generation = self.next_generation();

        let total = Duration::from_secs(u64::from(fade_seconds));
        let period = (total / self.steps).max(Duration::from_millis(1));
        let events = self.events.clone();
        let ticker = ScopedTask::spawn(async move {
            let mut interval = delayed_interval(period);
            loop {
                interval.tick().await;
                if events.send(TimerEvent::FadeTick { generation }).is_err() {
                    break;
                }
            }
        });

        debug!(
            generation,
            next = %armed.id,
            fade_seconds,
            period_ms = period.as_millis() as u64,
            "Fade-out started"
        );

        self.state = FadeState::FadingOut {
            generation,
            original_volume,
            current_volume: original_volume,
            step: original_volume / self.steps as f32,
            steps_remaining: self.steps,
            armed: Box::new(armed),
            _ticker: ticker,
        };
        generation
    }

    /// Advance the running fade by one step.
    pub fn on_tick(&mut self, event_generation: u64) -> FadeStep {
        let FadeState::FadingOut {
            generation,
            current_volume,
            step,
            steps_remaining,
            ..
        } = &mut self.state
        else {
            return FadeStep::Stale;
        };
        if *generation != event_generation {
            return FadeStep::Stale;
        }

        *current_volume -= *step;
        *steps_remaining = steps_remaining.saturating_sub(1);
        if *current_volume > SILENCE && *steps_remaining > 0 {
            return FadeStep::Continue {
                volume: *current_volume,
            };
        }

        // Dropping the state stops the ticker.
        match std::mem::replace(&mut self.state, FadeState::Idle) {
            FadeState::FadingOut {
                armed,
                original_volume,
                ..
            } => FadeStep::Swap {
                armed,
                original_volume,
            },
            _ => FadeStep::Stale,
        }
    }

    /// Schedule the snap-back to `original_volume` after the settle delay.
    pub fn begin_settle(&mut self, original_volume: f32) -> u64 {
        self.cancel();
        let generation = self.next_generation();
        let delay = self.settle_delay;
        let events = self.events.clone();
        let timer = ScopedTask::spawn(async move {
            sleep(delay).await;
            let _ = events.send(TimerEvent::Settle { generation });
        });
        self.state = FadeState::Settling {
            generation,
            original_volume,
            _timer: timer,
        };
        generation
    }

    /// Finish the snap-back. Returns the volume to restore, or `None` for a
    /// stale event.
    pub fn on_settle(&mut self, event_generation: u64) -> Option<f32> {
        match &self.state {
            FadeState::Settling {
                generation,
                original_volume,
                ..
            } if *generation == event_generation => {
                let volume = *original_volume;
                self.state = FadeState::Idle;
                Some(volume)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for CrossfadeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            FadeState::Idle => "idle",
            FadeState::FadingOut { .. } => "fading",
            FadeState::Settling { .. } => "settling",
        };
        f.debug_struct("CrossfadeController")
            .field("generation", &self.generation)
            .field("state", &state)
            .finish()
    }
}
