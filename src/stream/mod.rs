//! Stream combinators used by session subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
