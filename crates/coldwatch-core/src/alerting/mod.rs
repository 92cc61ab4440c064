//! Alerting for out-of-range readings
//!
//! Provides severity assignment, the alert lifecycle state machine, and
//! notification delivery.

mod lifecycle;
mod notifier;
mod severity;

pub(crate) use lifecycle::record_created;
pub use lifecycle::AlertLifecycle;
pub use notifier::{AlertNotifier, NotificationError, NotificationResult, NotificationSender};
pub use severity::{DeviationSeverityPolicy, FixedSeverityPolicy, SeverityPolicy};
