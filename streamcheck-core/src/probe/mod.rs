//! One-shot endpoint probes run before a player is ever launched

pub mod playlist;
pub mod reachability;

pub use playlist::PlaylistProbe;
pub use reachability::probe_tcp;
