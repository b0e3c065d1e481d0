pub mod device_bridge;
pub mod screen;
pub mod wait;

pub use device_bridge::DeviceBridge;
pub use screen::{AppControl, Bounds, Element, Locator, Screen, TextMatch};
pub use wait::{poll_until, wait_until, Condition};
