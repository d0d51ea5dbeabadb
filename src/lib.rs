pub mod builtins;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resolution;
pub mod storage;
mod tabs;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TabsConfig;
pub use error::{Result, TabsError};
pub use metrics::{EventType, Task, TaskStats, Token};
pub use resolution::{Period, Resolution};
pub use storage::StorageAdapter;
pub use tabs::Tabs;
