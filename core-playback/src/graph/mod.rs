//! # Audio Processing Graph
//!
//! Optional processing chain between the output channel and the device:
//!
//! ```text
//! source → 32 Hz → 64 Hz → … → 16 kHz → compressor → master gain → destination
//! ```
//!
//! ## Overview
//!
//! [`ProcessingGraph`] is a small node arena with explicit edges. It is shared
//! with the host audio thread through [`SampleProcessor`], so all mutable state
//! sits behind one `parking_lot` mutex that is only held for a buffer at a
//! time.
//!
//! Nodes are created once per graph and never removed. Connecting always
//! severs every existing edge first, so rebuilding the chain any number of
//! times leaves exactly one path from source to destination.
//!
//! [`AudioGraphBuilder`] decides whether the graph should exist at all and
//! keeps the host engine in a usable state.

mod builder;
pub mod nodes;

pub use builder::{AudioGraphBuilder, GraphStatus};

use crate::equalizer::{CompressorPreset, EQ_FREQUENCIES, EQ_Q};
use bridge_traits::audio::SampleProcessor;
use nodes::{Compressor, GainStage, PeakingBand};
use parking_lot::Mutex;

pub const BAND_COUNT: usize = EQ_FREQUENCIES.len();

const SOURCE: usize = 0;
const FIRST_BAND: usize = 1;
const COMPRESSOR: usize = FIRST_BAND + BAND_COUNT;
const MASTER: usize = COMPRESSOR + 1;
const DESTINATION: usize = MASTER + 1;

/// Kind of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Source,
    Peaking,
    Compressor,
    Gain,
    Destination,
}

enum Node {
    Source,
    Peaking(PeakingBand),
    Compressor(Compressor),
    Gain(GainStage),
    Destination,
}

impl Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::Source => NodeKind::Source,
            Node::Peaking(_) => NodeKind::Peaking,
            Node::Compressor(_) => NodeKind::Compressor,
            Node::Gain(_) => NodeKind::Gain,
            Node::Destination => NodeKind::Destination,
        }
    }

    fn process_frame(&mut self, frame: &mut [f32]) {
        match self {
            Node::Peaking(band) => band.process_frame(frame),
            Node::Compressor(comp) => comp.process_frame(frame),
            Node::Gain(gain) => gain.process_frame(frame),
            Node::Source | Node::Destination => {}
        }
    }
}

struct Inner {
    nodes: Vec<Node>,
    edges: Vec<(usize, usize)>,
    /// Processing order from source to destination, when one exists.
    route: Option<Vec<usize>>,
}

impl Inner {
    fn rebuild_route(&mut self) {
        let mut route = Vec::with_capacity(self.nodes.len());
        let mut at = SOURCE;
        while at != DESTINATION {
            if route.len() > self.nodes.len() {
                self.route = None;
                return;
            }
            let Some(&(_, to)) = self.edges.iter().find(|(from, _)| *from == at) else {
                self.route = None;
                return;
            };
            if !matches!(self.nodes[to], Node::Source | Node::Destination) {
                route.push(to);
            }
            at = to;
        }
        self.route = Some(route);
    }
}

/// The EQ, compressor and master gain chain.
pub struct ProcessingGraph {
    sample_rate: u32,
    inner: Mutex<Inner>,
}

impl ProcessingGraph {
    /// Create every node, unconnected. Band gains start at 0 dB, the
    /// compressor is transparent and the master gain is 1.
    pub fn new(sample_rate: u32) -> Self {
        let rate = sample_rate as f32;
        let mut nodes = Vec::with_capacity(DESTINATION + 1);
        nodes.push(Node::Source);
        for frequency in EQ_FREQUENCIES {
            nodes.push(Node::Peaking(PeakingBand::new(frequency, EQ_Q, rate)));
        }
        nodes.push(Node::Compressor(Compressor::new(rate)));
        nodes.push(Node::Gain(GainStage::new(1.0)));
        nodes.push(Node::Destination);

        Self {
            sample_rate,
            inner: Mutex::new(Inner {
                nodes,
                edges: Vec::new(),
                route: None,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().edges.len()
    }

    /// Node kinds in processing order, or `None` when the chain is broken.
    pub fn route_kinds(&self) -> Option<Vec<NodeKind>> {
        let inner = self.inner.lock();
        inner
            .route
            .as_ref()
            .map(|route| route.iter().map(|&i| inner.nodes[i].kind()).collect())
    }

    /// Sever every edge. Audio passes through untouched until reconnected.
    pub fn disconnect_all(&self) {
        let mut inner = self.inner.lock();
        inner.edges.clear();
        inner.route = None;
    }

    /// Sever every edge, then wire the fixed chain.
    pub fn connect_chain(&self) {
        let mut inner = self.inner.lock();
        inner.edges.clear();
        inner.edges.push((SOURCE, FIRST_BAND));
        for band in FIRST_BAND..COMPRESSOR {
            inner.edges.push((band, band + 1));
        }
        inner.edges.push((COMPRESSOR, MASTER));
        inner.edges.push((MASTER, DESTINATION));
        inner.rebuild_route();
        for node in inner.nodes.iter_mut() {
            match node {
                Node::Peaking(band) => band.reset(),
                Node::Compressor(comp) => comp.reset(),
                _ => {}
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().route.is_some()
    }

    pub fn set_band_gains(&self, gains_db: &[f32; BAND_COUNT]) {
        let mut inner = self.inner.lock();
        for (node, gain) in inner.nodes[FIRST_BAND..COMPRESSOR].iter_mut().zip(gains_db) {
            if let Node::Peaking(band) = node {
                band.set_gain_db(*gain);
            }
        }
    }

    pub fn band_gains(&self) -> [f32; BAND_COUNT] {
        let inner = self.inner.lock();
        let mut gains = [0.0; BAND_COUNT];
        for (slot, node) in gains.iter_mut().zip(&inner.nodes[FIRST_BAND..COMPRESSOR]) {
            if let Node::Peaking(band) = node {
                *slot = band.gain_db();
            }
        }
        gains
    }

    pub fn set_compressor(&self, preset: CompressorPreset) {
        if let Node::Compressor(comp) = &mut self.inner.lock().nodes[COMPRESSOR] {
            comp.set_preset(preset);
        }
    }

    pub fn compressor(&self) -> CompressorPreset {
        match &self.inner.lock().nodes[COMPRESSOR] {
            Node::Compressor(comp) => comp.preset(),
            _ => CompressorPreset::TRANSPARENT,
        }
    }

    pub fn set_master_gain(&self, gain: f32) {
        if let Node::Gain(stage) = &mut self.inner.lock().nodes[MASTER] {
            stage.set_gain(gain);
        }
    }

    pub fn master_gain(&self) -> f32 {
        match &self.inner.lock().nodes[MASTER] {
            Node::Gain(stage) => stage.gain(),
            _ => 1.0,
        }
    }
}

impl SampleProcessor for ProcessingGraph {
    fn process(&self, samples: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut guard = self.inner.lock();
        let Inner { nodes, route, .. } = &mut *guard;
        let Some(route) = route.as_ref() else {
            return;
        };
        for frame in samples.chunks_exact_mut(channels) {
            for &index in route {
                nodes[index].process_frame(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_graph_has_all_nodes_and_no_edges() {
        let graph = ProcessingGraph::new(48_000);
        assert_eq!(graph.node_count(), 14);
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.is_connected());
    }

    #[test]
    fn test_connect_chain_is_idempotent() {
        let graph = ProcessingGraph::new(48_000);
        graph.connect_chain();
        graph.connect_chain();
        graph.connect_chain();
        assert_eq!(graph.edge_count(), 13);
        assert_eq!(graph.node_count(), 14);

        let kinds = graph.route_kinds().unwrap();
        assert_eq!(kinds.len(), 12);
        assert!(kinds[..10].iter().all(|k| *k == NodeKind::Peaking));
        assert_eq!(kinds[10], NodeKind::Compressor);
        assert_eq!(kinds[11], NodeKind::Gain);
    }

    #[test]
    fn test_unconnected_graph_passes_audio_through() {
        let graph = ProcessingGraph::new(48_000);
        graph.set_master_gain(0.0);
        let mut samples = vec![0.5f32; 8];
        graph.process(&mut samples, 2);
        assert_eq!(samples, vec![0.5; 8]);
    }

    #[test]
    fn test_master_gain_applies_when_connected() {
        let graph = ProcessingGraph::new(48_000);
        graph.connect_chain();
        graph.set_master_gain(0.5);

        let mut samples = vec![0.0f32; 16];
        samples[0] = 0.4;
        graph.process(&mut samples, 2);
        assert!((samples[0] - 0.2).abs() < 1e-4);

        graph.disconnect_all();
        assert_eq!(graph.edge_count(), 0);
        let mut samples = vec![0.4f32; 2];
        graph.process(&mut samples, 2);
        assert_eq!(samples, vec![0.4, 0.4]);
    }

    #[test]
    fn test_settings_are_stored() {
        let graph = ProcessingGraph::new(44_100);
        let mut gains = [0.0; BAND_COUNT];
        gains[0] = 7.2;
        gains[9] = -12.0;
        graph.set_band_gains(&gains);
        graph.set_compressor(CompressorPreset::NORMALIZE);

        assert_eq!(graph.band_gains(), gains);
        assert_eq!(graph.compressor(), CompressorPreset::NORMALIZE);
        assert_eq!(graph.sample_rate(), 44_100);
    }
}
