//! Progress rate-limiting for download events.

mod throttle;

pub use throttle::ProgressThrottle;
