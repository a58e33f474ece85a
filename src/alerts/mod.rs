//! Custom alerts defined by files in a directory
//!
//! - **definition**: the file format and its parser
//! - **store**: the lock-guarded table reconciled from the directory

pub mod definition;
pub mod store;

pub use definition::{
    ALERT_FILE_EXTENSION, AlertDefinition, AlertValue, MIN_ALERT_INTERVAL, parse_alert_file,
    parse_interval,
};
pub use store::{AlertStore, ReloadReport};
