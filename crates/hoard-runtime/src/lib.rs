//! Runtime services shared by the hoard components.
//!
//! Currently this is the background [`WorkQueue`]: a FIFO executor for
//! fire-and-forget async work (cache warming, cache writes) that must not
//! block interactive callers and must not outlive the host.

#![deny(unsafe_code)]

mod work_queue;

pub use work_queue::{WorkQueue, WorkQueueConfig};
