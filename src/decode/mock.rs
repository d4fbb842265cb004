//! Scripted decode engine for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::decode::protocol::Symbol;
use crate::decode::DecodeEngine;
use crate::frame::Frame;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared observation handle for a [`MockEngine`].
///
/// Clones share the same counters, so a probe taken before the engine
/// moves into the worker thread keeps reporting afterwards.
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    seen_dimensions: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl EngineProbe {
    /// Completed decode invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of decodes ever observed running at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Frame dimensions in the order the engine received them.
    pub fn seen_dimensions(&self) -> Vec<(u32, u32)> {
        lock(&self.seen_dimensions).clone()
    }
}

/// Decode engine with scripted results and optional artificial delays.
pub struct MockEngine {
    script: Mutex<VecDeque<Vec<Symbol>>>,
    fallback: Vec<Symbol>,
    delays: Mutex<VecDeque<Duration>>,
    delay: Option<Duration>,
    probe: EngineProbe,
}

impl MockEngine {
    /// Engine that never recognizes anything.
    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    /// Engine answering every request with the same symbols.
    pub fn returning(symbols: Vec<Symbol>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: symbols,
            delays: Mutex::new(VecDeque::new()),
            delay: None,
            probe: EngineProbe::default(),
        }
    }

    /// Queues per-request results consumed before the fallback applies.
    pub fn with_script(self, results: Vec<Vec<Symbol>>) -> Self {
        *lock(&self.script) = results.into();
        self
    }

    /// Fixed artificial decode time for every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues per-request decode times consumed before the fixed delay.
    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        *lock(&self.delays) = delays.into();
        self
    }

    /// Observation handle; take it before the engine moves into a worker.
    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

impl DecodeEngine for MockEngine {
    fn decode(&self, frame: &Frame) -> Vec<Symbol> {
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);
        lock(&self.probe.seen_dimensions).push(frame.dimensions());

        let delay = lock(&self.delays).pop_front().or(self.delay);
        if let Some(delay) = delay {
            // Engines run on the worker thread, so blocking here models a
            // slow decode without touching the scheduler context.
            std::thread::sleep(delay);
        }

        let result = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_results_pop_in_order_then_fall_back() {
        let engine = MockEngine::returning(vec![Symbol::ean13("4607004345302")])
            .with_script(vec![Vec::new(), vec![Symbol::ean13("5901234123457")]]);
        let frame = Frame::new(2, 2, vec![0; 4]);

        assert!(engine.decode(&frame).is_empty());
        assert_eq!(engine.decode(&frame)[0].payload_text(), "5901234123457");
        assert_eq!(engine.decode(&frame)[0].payload_text(), "4607004345302");
        assert_eq!(engine.probe().calls(), 3);
    }

    #[test]
    fn probe_records_dimensions() {
        let engine = MockEngine::empty();
        let probe = engine.probe();
        engine.decode(&Frame::new(4, 2, vec![0; 8]));
        engine.decode(&Frame::new(8, 4, vec![0; 32]));
        assert_eq!(probe.seen_dimensions(), vec![(4, 2), (8, 4)]);
        assert_eq!(probe.max_active(), 1);
    }
}
