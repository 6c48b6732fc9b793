// Wire codec for the vendor's push channel (Pusher-compatible protocol 7).
//
// Frames are JSON objects `{ "event", "channel"?, "data"? }` where `data`
// is usually a JSON-encoded *string*. Pure functions only -- the transport
// and listener own all I/O and state.

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::Error;

/// Protocol version spoken over the websocket.
const PROTOCOL_VERSION: u8 = 7;

/// Channel event name carrying a [`crate::models::ModeEvent`] payload.
pub const EVENT_MODE: &str = "mode";

/// Channel event name carrying a full replacement [`crate::models::Device`].
pub const EVENT_DEVICE: &str = "device";

/// Build the websocket URL for the vendor's push application key.
pub fn connection_url(host: &str, app_key: &str) -> Result<Url, Error> {
    let url = format!(
        "wss://{host}/app/{app_key}?protocol={PROTOCOL_VERSION}&client=scout-rs&version={}",
        env!("CARGO_PKG_VERSION"),
    );
    Ok(Url::parse(&url)?)
}

/// The push channel name for one location.
pub fn location_channel(location_id: &str) -> String {
    format!("private-{location_id}")
}

// ── Inbound ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Handshake completed; sent on the first connect and on every
    /// transport-level reconnect.
    ConnectionEstablished { socket_id: String },
    /// Keepalive probe; must be answered with a pong.
    Ping,
    /// Server acknowledged a channel subscription.
    SubscriptionSucceeded { channel: String },
    /// An application event on a subscribed channel. The payload is the
    /// raw JSON string the vendor sent.
    ChannelEvent {
        channel: String,
        event: String,
        payload: String,
    },
    /// Server-side protocol error.
    ProtocolError { message: String },
}

/// Decode one text frame. Returns `None` for frames this client has no
/// use for (pongs, cache miss notices, ...).
pub fn decode(text: &str) -> Option<InboundFrame> {
    let raw: RawFrame = serde_json::from_str(text).ok()?;

    match raw.event.as_str() {
        "pusher:connection_established" => {
            let data = unwrap_data(raw.data.as_ref())?;
            let socket_id = data.get("socket_id")?.as_str()?.to_owned();
            Some(InboundFrame::ConnectionEstablished { socket_id })
        }
        "pusher:ping" => Some(InboundFrame::Ping),
        "pusher_internal:subscription_succeeded" => Some(InboundFrame::SubscriptionSucceeded {
            channel: raw.channel?,
        }),
        "pusher:error" => {
            let message = unwrap_data(raw.data.as_ref())
                .and_then(|d| d.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "unknown push error".to_owned());
            Some(InboundFrame::ProtocolError { message })
        }
        _ if raw.event.starts_with("pusher") => None,
        _ => {
            let payload = match raw.data {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => return None,
            };
            Some(InboundFrame::ChannelEvent {
                channel: raw.channel.unwrap_or_default(),
                event: raw.event,
                payload,
            })
        }
    }
}

/// `data` arrives either as a JSON-encoded string or (from some servers)
/// as a plain object; accept both.
fn unwrap_data(data: Option<&serde_json::Value>) -> Option<serde_json::Value> {
    match data? {
        serde_json::Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Encode a channel subscription frame.
pub fn encode_subscribe(channel: &str, auth: &str) -> String {
    json!({
        "event": "pusher:subscribe",
        "data": { "channel": channel, "auth": auth },
    })
    .to_string()
}

/// Encode the keepalive reply.
pub fn encode_pong() -> String {
    json!({ "event": "pusher:pong", "data": {} }).to_string()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_connection_established_with_string_data() {
        let frame = decode(
            r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\",\"activity_timeout\":120}"}"#,
        );
        assert_eq!(
            frame,
            Some(InboundFrame::ConnectionEstablished {
                socket_id: "123.456".into()
            })
        );
    }

    #[test]
    fn decodes_connection_established_with_object_data() {
        let frame = decode(
            r#"{"event":"pusher:connection_established","data":{"socket_id":"9.9"}}"#,
        );
        assert_eq!(
            frame,
            Some(InboundFrame::ConnectionEstablished {
                socket_id: "9.9".into()
            })
        );
    }

    #[test]
    fn decodes_ping() {
        assert_eq!(decode(r#"{"event":"pusher:ping","data":"{}"}"#), Some(InboundFrame::Ping));
    }

    #[test]
    fn decodes_channel_event_with_string_payload() {
        let frame = decode(
            r#"{"event":"mode","channel":"private-loc1","data":"{\"mode_id\":\"m1\",\"event\":\"armed\"}"}"#,
        );
        match frame {
            Some(InboundFrame::ChannelEvent {
                channel,
                event,
                payload,
            }) => {
                assert_eq!(channel, "private-loc1");
                assert_eq!(event, "mode");
                assert!(payload.contains("\"mode_id\""));
            }
            other => panic!("expected channel event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_subscription_succeeded() {
        let frame = decode(
            r#"{"event":"pusher_internal:subscription_succeeded","channel":"private-loc1","data":"{}"}"#,
        );
        assert_eq!(
            frame,
            Some(InboundFrame::SubscriptionSucceeded {
                channel: "private-loc1".into()
            })
        );
    }

    #[test]
    fn ignores_unknown_internal_frames() {
        assert_eq!(decode(r#"{"event":"pusher:pong","data":"{}"}"#), None);
        assert_eq!(decode("not json"), None);
    }

    #[test]
    fn subscribe_frame_shape() {
        let frame = encode_subscribe("private-loc1", "key:sig");
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "pusher:subscribe");
        assert_eq!(parsed["data"]["channel"], "private-loc1");
        assert_eq!(parsed["data"]["auth"], "key:sig");
    }

    #[test]
    fn location_channel_name() {
        assert_eq!(location_channel("abc123"), "private-abc123");
    }

    #[test]
    fn connection_url_carries_protocol_and_key() {
        let url = connection_url("ws.example.com", "key123").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/app/key123");
        assert!(url.query().unwrap().contains("protocol=7"));
    }
}
