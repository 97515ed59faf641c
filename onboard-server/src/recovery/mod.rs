//! Background repair of stuck onboarding requests

mod scanner;

pub use scanner::{MIN_INTERVAL, RecoveryConfig, RecoveryReport, RecoveryScanner};
