//! Change feed streaming: relay, response sink, and per-request session.

pub mod relay;
pub mod session;
pub mod sink;

pub use relay::{RelayClosed, RelayReceiver, RelaySender};
pub use session::{SessionEnd, SessionState, StreamSession};
pub use sink::{ClientGone, ResponseSink};
