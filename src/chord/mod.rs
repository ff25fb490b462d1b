pub mod node;
pub mod ring;
pub mod types;

/// Routing walks are bounded at this multiple of the ring bit width M; a
/// walk that is still circling after that many hops has stopped making
/// progress and fails instead of looping.
pub const ROUTE_HOP_FACTOR: u32 = 4;
