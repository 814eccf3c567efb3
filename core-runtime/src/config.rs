//! # Core Configuration Module
//!
//! Wires host bridges into the core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds every bridge the core needs. It is built with
//! [`CoreConfigBuilder`], which fails fast with
//! [`Error::CapabilityMissing`] when a bridge without a default is absent.
//!
//! ## Required Dependencies
//!
//! - `AudioOutput` - always host-provided
//! - `ConfigStore` - defaults to the desktop JSON file store with `desktop-shims`
//!
//! ## Optional Dependencies
//!
//! - `AudioEngine` - without it the processing graph stays inactive and
//!   volume always lands on the output channel
//! - `VisibilityMonitor` - defaults to "always visible"
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_output(Arc::new(MyOutput::new()))
//!     .audio_engine(Arc::new(MyEngine::new()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioEngine, AudioOutput, Clock, ConfigStore, SystemClock, VisibilityMonitor};
use std::sync::Arc;

/// Bridges and runtime knobs the core is built from.
#[derive(Clone)]
pub struct CoreConfig {
    /// Persisted settings storage (required)
    pub config_store: Arc<dyn ConfigStore>,

    /// The output channel (required)
    pub audio_output: Arc<dyn AudioOutput>,

    /// Host audio context for the processing graph (optional)
    pub audio_engine: Option<Arc<dyn AudioEngine>>,

    /// Window visibility, used to pause library polling
    pub visibility: Arc<dyn VisibilityMonitor>,

    /// Wall-clock source
    pub clock: Arc<dyn Clock>,

    /// Per-subscriber event buffer
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("has_audio_engine", &self.audio_engine.is_some())
            .field("event_buffer_size", &self.event_buffer_size)
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }
        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size must not exceed 65536".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    config_store: Option<Arc<dyn ConfigStore>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    audio_engine: Option<Arc<dyn AudioEngine>>,
    visibility: Option<Arc<dyn VisibilityMonitor>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn audio_engine(mut self, engine: Arc<dyn AudioEngine>) -> Self {
        self.audio_engine = Some(engine);
        self
    }

    pub fn visibility(mut self, monitor: Arc<dyn VisibilityMonitor>) -> Self {
        self.visibility = Some(monitor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `AudioOutput` was given, or no
    ///   `ConfigStore` was given and `desktop-shims` is off
    /// - [`Error::Config`] when validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let audio_output = self.audio_output.ok_or_else(|| Error::CapabilityMissing {
            capability: "AudioOutput".to_string(),
            message: "No audio output provided. The host shell must implement \
                      AudioOutput for its playback device."
                .to_string(),
        })?;

        let config_store = match self.config_store {
            Some(store) => store,
            None => provide_default_config_store()?,
        };

        let config = CoreConfig {
            config_store,
            audio_output,
            audio_engine: self.audio_engine,
            visibility: self
                .visibility
                .unwrap_or_else(provide_default_visibility),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_config_store() -> Result<Arc<dyn ConfigStore>> {
    Ok(Arc::new(bridge_desktop::JsonFileConfigStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_config_store() -> Result<Arc<dyn ConfigStore>> {
    Err(Error::CapabilityMissing {
        capability: "ConfigStore".to_string(),
        message: "No settings store provided. Enable the `desktop-shims` feature \
                  or inject a ConfigStore implementation."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_visibility() -> Arc<dyn VisibilityMonitor> {
    Arc::new(bridge_desktop::DesktopVisibility::new())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_visibility() -> Arc<dyn VisibilityMonitor> {
    Arc::new(AlwaysVisible)
}

#[cfg(not(feature = "desktop-shims"))]
struct AlwaysVisible;

#[cfg(not(feature = "desktop-shims"))]
impl VisibilityMonitor for AlwaysVisible {
    fn visibility(&self) -> bridge_traits::WindowVisibility {
        bridge_traits::WindowVisibility::Visible
    }
}
