//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - [`JsonFileConfigStore`] keeps the settings document as `config.json` in
//!   the platform config directory, written atomically.
//! - [`DesktopVisibility`] tracks the window's minimized/hidden state as
//!   reported by the shell's window events.
//!
//! Audio output is not provided here: the desktop shell owns the device and
//! implements [`AudioOutput`](bridge_traits::AudioOutput) itself.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopVisibility, JsonFileConfigStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(JsonFileConfigStore::new());
//! let visibility = Arc::new(DesktopVisibility::new());
//! // window.on_minimize(move || visibility.set_visible(false));
//! ```

mod config_store;
mod visibility;

pub use config_store::JsonFileConfigStore;
pub use visibility::DesktopVisibility;
