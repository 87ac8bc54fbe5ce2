//! Character-based token cost estimation.
//!
//! The estimate is deliberately simple: input characters divided by a fixed
//! ratio, plus the full requested output allowance. Embedded binary payloads
//! (base64 blobs, raw PDF bytes) tokenize far worse than prose, so they are
//! flagged for the logs; they are not rejected.

use crate::provider::GenerateRequest;

/// Base64 runs at least this long without whitespace look like embedded files.
const BINARY_RUN_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub suspect_binary: bool,
}

impl CostEstimate {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

pub fn estimate_cost(request: &GenerateRequest, chars_per_token: u64) -> CostEstimate {
    let chars = (request.system.chars().count() + request.content.chars().count()) as u64;
    CostEstimate {
        input_tokens: chars.div_ceil(chars_per_token.max(1)),
        output_tokens: u64::from(request.max_tokens),
        suspect_binary: looks_binary(&request.content) || looks_binary(&request.system),
    }
}

/// PDF signatures, data URIs, or long unbroken base64 runs.
pub fn looks_binary(text: &str) -> bool {
    if text.contains("%PDF-") || text.contains(";base64,") {
        return true;
    }

    let mut run = 0usize;
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=') {
            run += 1;
            if run >= BINARY_RUN_THRESHOLD {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
