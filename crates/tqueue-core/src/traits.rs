//! Persistence callback capability
//!
//! The engine mirrors every mutation to at most one attached
//! [`TQueueCallback`]. Callbacks never get a handle back into the engine,
//! so notifications cannot re-enter it.

use std::any::Any;

use crate::error::StorageError;
use crate::event::{Event, QueueId};
use crate::event_id::EventId;

/// Conversion of a boxed callback back into `Box<dyn Any>`
///
/// Blanket-implemented for every `Send + 'static` type so that an owner can
/// recover its concrete adapter from [`TQueue::extract_callback`](crate::TQueue::extract_callback).
pub trait IntoAny: Any + Send {
    /// Convert into a boxed `Any`
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    /// Borrow as `Any` for type checks
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send> IntoAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Observer of engine mutations
///
/// Each method is called synchronously before the triggering engine call
/// returns. An error aborts that call and is returned to its caller as
/// [`TQueueError::Storage`](crate::TQueueError::Storage).
pub trait TQueueCallback: IntoAny {
    /// An event was appended to `queue_id`
    fn on_push(&mut self, queue_id: QueueId, event: &Event) -> Result<(), StorageError>;

    /// Every retained event of `queue_id` with id `<= up_to` was removed
    fn on_forget(&mut self, queue_id: QueueId, up_to: EventId) -> Result<(), StorageError>;

    /// The single event `event_id` of `queue_id` was removed
    fn on_pop(&mut self, queue_id: QueueId, event_id: EventId) -> Result<(), StorageError>;
}
