//! Remote collaboration session: forwards local events and service logs out,
//! and remote build/deploy/test requests in.

mod channel;
mod config;
mod protocol;
mod session;
mod websocket;

pub use channel::{ChannelState, EventChannel};
pub use config::RemoteConfig;
pub use protocol::{decode_inbound, encode_event, encode_log};
pub use session::{Connection, Frame, RemoteSession};
pub use websocket::WsRemoteSession;
