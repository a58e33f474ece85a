//! Background actors of the agent
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle that wraps an mpsc command channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │ Agent (heartbeat)  │
//!                 └─────────┬──────────┘
//!                           │ spawns
//!              ┌────────────┴────────────┐
//!              │                         │
//!   ┌──────────▼──────────┐   ┌──────────▼──────────┐
//!   │ ProcessCollector    │   │ AlertMonitor        │
//!   │ (collect interval)  │   │ (every minute)      │
//!   └──────────┬──────────┘   └──────────┬──────────┘
//!              │ swap                    │ reload + due_alerts
//!   ┌──────────▼──────────┐   ┌──────────▼──────────┐
//!   │ SampleStore         │   │ AlertStore          │
//!   └─────────────────────┘   └──────────┬──────────┘
//!                                        │ spawn
//!                             ┌──────────▼──────────┐
//!                             │ Dispatcher          │
//!                             └─────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for `CollectNow` / `CheckNow`
//! 3. **Shutdown**: an explicit `Shutdown` command, or dropping every handle

pub mod alert;
pub mod collector;
pub mod messages;

pub use alert::{ALERT_CHECK_INTERVAL, AlertMonitorHandle};
pub use collector::CollectorHandle;
