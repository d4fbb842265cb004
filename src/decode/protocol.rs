//! Typed messages crossing the decoder worker boundary.
//!
//! The worker channel carries a closed set of message variants instead of
//! untyped event payloads, which keeps the single-outstanding-request rule
//! checkable at the type level. The serde representation is pinned so the
//! boundary stays bit-precise if the worker is ever moved out of process:
//!
//! ```text
//! {"type":"init","dimensions":[1920,1080]}
//! {"type":"scan","sequence":7,"data":[...]}
//! {"type":"scan","sequence":7,"result":[{"typeName":"EAN-13","data":[...]}]}
//! ```

use serde::{Deserialize, Serialize};

/// Wire name of the one symbology recognized for payload extraction.
pub const EAN13_TYPE_NAME: &str = "EAN-13";

/// Messages sent from the scheduler into the decode worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerRequest {
    /// Sent once at worker construction with the frame geometry every
    /// subsequent scan must conform to.
    Init {
        /// Frame width and height in pixels.
        dimensions: [u32; 2],
    },
    /// One decode request carrying the raw pixel buffer.
    Scan {
        /// Correlation id assigned by the scheduler.
        sequence: u64,
        /// Row-major 8-bit luminance data.
        data: Vec<u8>,
    },
}

/// Messages sent from the decode worker back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerResponse {
    /// Exactly one reply per accepted scan request, in submission order.
    Scan {
        /// Correlation id echoed from the request.
        sequence: u64,
        /// Recognized symbols; empty when the frame held no match.
        result: Vec<Symbol>,
    },
}

/// One structured decode match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbology tag, e.g. `"EAN-13"`.
    #[serde(rename = "typeName")]
    pub type_name: String,
    /// Raw payload bytes, decoded as one byte per character.
    pub data: Vec<u8>,
}

impl Symbol {
    /// Builds an EAN-13 symbol from its digit string.
    pub fn ean13(digits: &str) -> Self {
        Self {
            type_name: EAN13_TYPE_NAME.to_string(),
            data: digits.bytes().collect(),
        }
    }

    /// Payload text, one byte per character.
    pub fn payload_text(&self) -> String {
        self.data.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_wire_format_is_pinned() {
        let msg = WorkerRequest::Init {
            dimensions: [1920, 1080],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"init","dimensions":[1920,1080]}"#);
        assert_eq!(serde_json::from_str::<WorkerRequest>(&json).unwrap(), msg);
    }

    #[test]
    fn scan_request_wire_format_is_pinned() {
        let msg = WorkerRequest::Scan {
            sequence: 7,
            data: vec![0, 128, 255],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"scan","sequence":7,"data":[0,128,255]}"#);
        assert_eq!(serde_json::from_str::<WorkerRequest>(&json).unwrap(), msg);
    }

    #[test]
    fn scan_response_wire_format_is_pinned() {
        let msg = WorkerResponse::Scan {
            sequence: 7,
            result: vec![Symbol::ean13("4607004345306")],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"scan","sequence":7,"result":[{"typeName":"EAN-13","data":[52,54,48,55,48,48,52,51,52,53,51,48,54]}]}"#
        );
        assert_eq!(serde_json::from_str::<WorkerResponse>(&json).unwrap(), msg);
    }

    #[test]
    fn empty_result_round_trips() {
        let msg = WorkerResponse::Scan {
            sequence: 3,
            result: Vec::new(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"scan","sequence":3,"result":[]}"#);
    }

    #[test]
    fn payload_text_decodes_one_byte_per_character() {
        let symbol = Symbol {
            type_name: EAN13_TYPE_NAME.to_string(),
            data: vec![52, 54, 48, 55],
        };
        assert_eq!(symbol.payload_text(), "4607");
    }
}
