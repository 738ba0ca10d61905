//! Error types for the reactive primitives.

/// Errors raised by a [`ChangeNotifier`](crate::ChangeNotifier) subscription.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// The notifier already has its one active subscriber.
    #[error("Change notifier already has an active subscriber")]
    AlreadySubscribed,

    /// The subscription ID is unknown or was already unsubscribed.
    #[error("Invalid or already released subscription")]
    InvalidSubscription,

    /// The subscriber failed to apply a delivered change.
    #[error("Subscriber rejected change: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl NotifierError {
    /// Wrap a subscriber-side failure.
    pub fn rejected(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Rejected(Box::new(err))
    }
}

/// Errors raised by [`ObservableList`](crate::ObservableList) mutations.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// An index or range fell outside the list.
    #[error("Index {index} (count {count}) out of range for list of length {len}")]
    OutOfRange {
        index: usize,
        count: usize,
        len: usize,
    },

    /// The list was mutated but the subscriber failed to observe it.
    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

impl ListError {
    pub(crate) fn out_of_range(index: usize, count: usize, len: usize) -> Self {
        Self::OutOfRange { index, count, len }
    }
}
