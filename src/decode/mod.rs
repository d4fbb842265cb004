//! Barcode decoding: recognizer engines, the worker thread that runs them
//! and the typed message protocol between scheduler and worker.

pub mod ean13;
pub mod mock;
pub mod protocol;
pub mod worker;

pub use ean13::Ean13Engine;
pub use mock::{EngineProbe, MockEngine};
pub use protocol::{Symbol, WorkerRequest, WorkerResponse, EAN13_TYPE_NAME};
pub use worker::DecodeWorker;

use crate::frame::Frame;

/// A barcode recognizer run by the decode worker.
///
/// Engines receive whole frames and return every symbol they recognized,
/// or an empty vector when nothing matched. They execute on the worker's
/// dedicated thread and are free to block.
pub trait DecodeEngine: Send + Sync {
    /// Recognizes symbols in one frame.
    fn decode(&self, frame: &Frame) -> Vec<Symbol>;
}

/// A numbered frame on its way to the decode worker.
#[derive(Debug)]
pub struct DecodeRequest {
    /// Correlation id echoed back in the worker's response.
    pub sequence: u64,
    /// The frame to decode; consumed by the request.
    pub frame: Frame,
}
