//! Graph lifecycle and routing decision.

use super::ProcessingGraph;
use crate::equalizer::AudioSettings;
use bridge_traits::audio::{AudioEngine, EngineState, SampleProcessor};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether volume should go through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphStatus {
    /// No build has been attempted yet.
    #[default]
    Uninitialized,
    /// The graph is attached and owns the volume.
    Active,
    /// Not wanted or not available; volume goes to the output channel.
    Inactive,
}

/// Builds the processing graph on demand and keeps it attached to the host
/// engine.
///
/// `ensure` never fails: every problem ends in [`GraphStatus::Inactive`] and
/// the caller routes volume to the output channel instead.
pub struct AudioGraphBuilder {
    engine: Option<Arc<dyn AudioEngine>>,
    graph: Option<Arc<ProcessingGraph>>,
    status: GraphStatus,
    attached: bool,
}

impl AudioGraphBuilder {
    pub fn new(engine: Option<Arc<dyn AudioEngine>>) -> Self {
        Self {
            engine,
            graph: None,
            status: GraphStatus::Uninitialized,
            attached: false,
        }
    }

    pub fn status(&self) -> GraphStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == GraphStatus::Active
    }

    pub fn graph(&self) -> Option<&Arc<ProcessingGraph>> {
        self.graph.as_ref()
    }

    /// Bring the graph in line with `settings` and report the resulting route.
    pub async fn ensure(&mut self, settings: &AudioSettings) -> GraphStatus {
        if !settings.wants_graph() {
            self.deactivate();
            return self.status;
        }

        let Some(engine) = self.engine.clone() else {
            if self.status != GraphStatus::Inactive {
                warn!("No audio engine; using direct output volume");
            }
            self.status = GraphStatus::Inactive;
            return self.status;
        };

        if engine.state() == EngineState::Closed {
            debug!("Audio engine closed, reopening");
            if let Err(e) = engine.reopen().await {
                warn!(error = %e, "Could not reopen audio engine");
                self.mark_lost();
                return self.status;
            }
            // A reopened engine has lost its processor.
            self.graph = None;
            self.attached = false;
        }

        if engine.state() == EngineState::Suspended {
            if let Err(e) = engine.resume().await {
                warn!(error = %e, "Audio engine resume failed");
            }
        }
        if engine.state() != EngineState::Running {
            warn!(state = ?engine.state(), "Audio engine not running; using direct output volume");
            self.status = GraphStatus::Inactive;
            return self.status;
        }

        let graph = match &self.graph {
            Some(graph) => graph.clone(),
            None => {
                let graph = Arc::new(ProcessingGraph::new(engine.sample_rate()));
                debug!(sample_rate = graph.sample_rate(), "Processing graph created");
                self.graph = Some(graph.clone());
                graph
            }
        };

        graph.connect_chain();
        graph.set_band_gains(&settings.band_gains_db());
        graph.set_compressor(settings.compressor());

        if !self.attached {
            let processor: Arc<dyn SampleProcessor> = graph.clone();
            if let Err(e) = engine.attach_processor(processor) {
                warn!(error = %e, "Could not attach processing graph");
                self.status = GraphStatus::Inactive;
                return self.status;
            }
            self.attached = true;
        }

        if self.status != GraphStatus::Active {
            debug!("Processing graph active");
        }
        self.status = GraphStatus::Active;
        self.status
    }

    /// Set the master gain. Returns false when the graph does not own the
    /// volume, in which case nothing changed.
    pub fn set_master_gain(&self, gain: f32) -> bool {
        match (&self.graph, self.status) {
            (Some(graph), GraphStatus::Active) => {
                graph.set_master_gain(gain);
                true
            }
            _ => false,
        }
    }

    fn deactivate(&mut self) {
        if self.attached {
            if let Some(engine) = &self.engine {
                engine.detach_processor();
            }
            self.attached = false;
            debug!("Processing graph detached");
        }
        self.status = GraphStatus::Inactive;
    }

    fn mark_lost(&mut self) {
        self.graph = None;
        self.attached = false;
        self.status = GraphStatus::Inactive;
    }
}
