//! Parley Directory - shared peer registry and capability routing
//!
//! The directory is process-wide mutable state owned by the runtime and
//! injected into every agent. It is a best-effort, eventually-consistent
//! view of who is running: entries are overwritten on re-registration
//! and never purged, so readers must tolerate stale rows.

pub mod directory;
pub mod router;

pub use directory::{PeerDescriptor, PeerDirectory};
pub use router::{choose, lexical_overlap, PeerPicker};
