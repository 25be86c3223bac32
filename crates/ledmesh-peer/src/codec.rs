use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::Result;

/// Converts envelopes to and from frame payloads.
///
/// Implementations operate over a closed set of event variants; a payload
/// that does not decode is dropped by the read loop, not treated as fatal.
pub trait EventCodec<E>: Send + Sync + 'static {
    fn marshal(&self, envelope: &Envelope<E>) -> Result<Bytes>;
    fn unmarshal(&self, payload: &[u8]) -> Result<Envelope<E>>;
}

/// JSON encoding via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<E> EventCodec<E> for JsonCodec
where
    E: Serialize + DeserializeOwned,
{
    fn marshal(&self, envelope: &Envelope<E>) -> Result<Bytes> {
        Ok(serde_json::to_vec(envelope)?.into())
    }

    fn unmarshal(&self, payload: &[u8]) -> Result<Envelope<E>> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::envelope::MessageKind;
    use crate::error::PeerError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum Msg {
        Ping { n: u32 },
    }

    #[test]
    fn json_envelope_layout() {
        let bytes = JsonCodec
            .marshal(&Envelope::request(7, Msg::Ping { n: 1 }))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "kind": "request",
                "event": { "type": "ping", "n": 1 }
            })
        );

        let back: Envelope<Msg> = JsonCodec.unmarshal(&bytes).unwrap();
        assert_eq!(back.kind, MessageKind::Request);
        assert_eq!(back.event, Msg::Ping { n: 1 });
    }

    #[test]
    fn unregistered_variant_is_rejected() {
        let payload = br#"{"kind":"event","event":{"type":"pong"}}"#;
        let result: Result<Envelope<Msg>> = JsonCodec.unmarshal(payload);
        assert!(matches!(result, Err(PeerError::Json(_))));
    }
}
