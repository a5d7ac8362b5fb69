//! Lane coordination - prefetch pools, fresh-buffer inboxes, refill routing
//!
//! - [`LaneCoordinator`]: pure routing and bookkeeping state
//! - [`CoordinatorService`]: background thread wiring it to the engine's
//!   queues and a [`SampleSource`](crate::source::SampleSource)

mod coordinator;
mod inbox;
mod pool;
mod service;

pub use coordinator::*;
pub use inbox::*;
pub use pool::*;
pub use service::*;
