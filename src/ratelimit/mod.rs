//! Rate limiting logic and state management.

mod client;
mod clock;
mod limiter;
mod log;
mod sweeper;
mod window;

pub use client::ClientKey;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimiter, WindowStatus};
pub use log::RequestLog;
pub use sweeper::Sweeper;
pub use window::{LimitWindow, TimeWindow, WindowSpec};
