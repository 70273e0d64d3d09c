//! # Event Bus Module
//!
//! Decoupled publish/subscribe between the orchestration core and its
//! collaborators (status reporter, operator console).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inspectkit_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, MachineEvent};
//!
//! let bus = EventBus::new();
//! bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Machine]),
//!     |event| {
//!         if let AppEvent::Machine(MachineEvent::ResetToIdle) = event {
//!             println!("carriage stopped");
//!         }
//!     },
//! );
//!
//! let mut receiver = bus.receiver();
//! bus.publish(AppEvent::Machine(MachineEvent::ResetToIdle)).ok();
//! assert!(receiver.try_recv().is_ok());
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
