//! REST backend for a hosted JSON document database.
//!
//! ```text
//! rest/
//! ├── transport.rs  HttpTransport trait → ReqwestTransport
//! ├── store.rs      RestStore (read / update / replace / subscribe)
//! ├── sse.rs        event-stream framing + document mirror
//! └── probe.rs      shallow root read → ConnectionCheck
//! ```

mod probe;
mod sse;
mod store;
mod transport;

pub use probe::ConnectionCheck;
pub use sse::{MirrorUpdate, SseDecoder, SseEvent, StreamMirror};
pub use store::RestStore;
pub use transport::{ByteStream, HttpResponse, HttpTransport, ReqwestTransport};
