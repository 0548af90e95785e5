use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};

use crate::detection::DetectedObject;

/// Detection request sent to a model-hosting service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    pub req_id: u64,
    /// Client send time (unix milliseconds), echoed through for latency
    /// accounting.
    pub sent_at_ms: i64,
    pub image_b64: String,
}

impl DetectRequest {
    pub fn new(req_id: u64, sent_at_ms: i64, image: &[u8]) -> Self {
        Self {
            req_id,
            sent_at_ms,
            image_b64: B64.encode(image),
        }
    }

    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        B64.decode(self.image_b64.as_bytes())
    }
}

/// Detection response returned by a model-hosting service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub req_id: u64,
    /// Server receive time (unix milliseconds).
    pub recv_time_ms: i64,
    pub objects: Vec<DetectedObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_payload_survives_the_wire_encoding() {
        let image = vec![0u8, 1, 2, 250, 251, 252];
        let request = DetectRequest::new(7, 1_700_000_000_000, &image);
        assert_eq!(request.image_bytes().unwrap(), image);
    }
}
