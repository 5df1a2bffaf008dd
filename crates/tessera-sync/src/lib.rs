//! Polling collaboration for Tessera diagrams.
//!
//! Local mutations are captured into an outbound queue; every tick the queue is swapped out and
//! exchanged with the session endpoint, and whatever collaborators sent back is merged into the
//! diagram through the remote channel.

pub mod capture;
pub mod error;
pub mod merge;
pub mod queue;
pub mod session;
pub mod transport;
pub mod wire;

pub use capture::{entry_from_event, CaptureHook};
pub use error::SyncError;
pub use merge::{merge_remote, MergeReport};
pub use queue::OutboundQueue;
pub use session::{CollaborationSync, ConnectionStatus, SyncConfig};
pub use transport::{HttpTransport, SyncTransport};
pub use wire::{EventKind, MutationLogEntry, SyncRequest, SyncResponse, UserRef};
