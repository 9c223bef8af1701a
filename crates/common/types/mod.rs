mod block;
mod channel;
mod reading;

pub use block::*;
pub use channel::*;
pub use reading::*;

/// Logical time carried by every reading. Never compared against the host clock.
pub type Timestamp = u64;
