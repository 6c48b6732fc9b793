// Push channel: realtime mode and device change notifications.
//
// Three layers, separated so each is testable on its own:
// - `protocol`: pure wire codec for the Pusher-compatible frame format
// - `transport`: the websocket connection + reconnect loop
// - `listener`: subscription state and handler fan-out, single-writer

pub mod protocol;
pub mod transport;

mod listener;

pub use listener::{DeviceHandler, Listener, ModeHandler};
pub use transport::ReconnectConfig;
