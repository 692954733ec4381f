//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

use crate::engine::SubscriptionId;

/// Error returned by a subscriber callback.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Subscriber {id} failed: {source}")]
    Subscriber {
        id: SubscriptionId,
        #[source]
        source: SubscriberError,
    },
}
