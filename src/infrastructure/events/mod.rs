//! Queue Events

mod publisher;

pub use publisher::{
    ErrorCallback, EventPublisher, ProgressCallback, QueueCallbacks, QueueEvent,
    StateChangeCallback,
};
