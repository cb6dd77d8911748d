pub mod dedup;
pub mod diagnostics;
pub mod monitor;
pub mod notifier;
pub mod source;

pub use dedup::Deduplicator;
pub use diagnostics::DiagnosticsWriter;
pub use monitor::{MonitorOptions, MonitorService, RoundSummary};
pub use notifier::{NotificationSink, ServerChanSink};
pub use source::PostSource;
