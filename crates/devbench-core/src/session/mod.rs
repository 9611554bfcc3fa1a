pub mod controller;
pub mod debounce;
pub mod normalize;

pub use controller::{DocumentSession, SessionOptions};
pub use debounce::{Clock, Debouncer, ManualClock, SystemClock};
pub use normalize::normalize_content;
