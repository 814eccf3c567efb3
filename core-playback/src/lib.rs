//! # Playback Module
//!
//! Sequencing, transitions and audio processing for a single output channel.
//!
//! ## Overview
//!
//! This module handles:
//! - What plays next and previous (context, manual queue, shuffle, history)
//! - Track transitions, instant or faded out and swapped
//! - The optional EQ, compressor and master gain chain, and volume routing
//! - The `PlaybackEngine` facade that owns player state
//!
//! ## Modules
//!
//! - [`sequencer`] - context sequence, manual queue, removal set, history
//! - [`shuffle`] - deterministic shuffle orders
//! - [`crossfade`] - fade-out, swap and snap-back state machine
//! - [`graph`] - processing graph nodes and the graph builder
//! - [`equalizer`] - bands, presets and slider mapping
//! - [`engine`] - the engine facade

pub mod config;
pub mod crossfade;
pub mod engine;
pub mod equalizer;
pub mod error;
pub mod graph;
pub mod sequencer;
pub mod shuffle;
pub mod state;

pub use config::PlaybackConfig;
pub use crossfade::{CrossfadeController, FadeStep, TimerEvent};
pub use engine::PlaybackEngine;
pub use equalizer::{AudioSettings, CompressorPreset, EqPreset, PRESETS};
pub use error::{PlaybackError, Result};
pub use graph::{AudioGraphBuilder, GraphStatus, ProcessingGraph};
pub use sequencer::{Cursor, ItemSource, NextItem, PlaybackSequencer};
pub use state::{PlayerState, RepeatMode};
