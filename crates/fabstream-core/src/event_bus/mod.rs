//! # Event Bus Module
//!
//! Publish/subscribe distribution of streaming events:
//! - Publishers emit typed events without knowing subscribers
//! - Subscribers filter and receive events of interest
//! - Supports both synchronous handlers and async receivers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fabstream_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, JobEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Job]),
//!     |event| {
//!         if let AppEvent::Job(JobEvent::NextCommand { line }) = event {
//!             println!("send: {}", line);
//!         }
//!     },
//! );
//!
//! bus.publish(AppEvent::Job(JobEvent::Finished)).ok();
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
