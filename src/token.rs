//! Latest-wins operation tokens
//!
//! Each asynchronous flow (search, dictionary lookup, translation) owns a [`TokenChannel`].
//! Starting an operation takes a fresh token; the operation checks its token at its
//! suspension points and only commits its result if no newer operation started since.
//! Channels are plain values owned by whoever runs the flow, never process globals.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ticket for one started operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationToken(u64);

impl OperationToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic counter for one kind of operation
#[derive(Debug, Default)]
pub struct TokenChannel {
    latest: AtomicU64,
}

impl TokenChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, superseding every earlier token
    pub fn next(&self) -> OperationToken {
        OperationToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The token of the operation started last, without starting a new one
    pub fn current(&self) -> OperationToken {
        OperationToken(self.latest.load(Ordering::SeqCst))
    }

    /// True while no newer operation has started
    pub fn is_current(&self, token: OperationToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Supersede whatever is in flight without starting anything
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Run `operation` under a fresh token and keep its output only if still current
    pub async fn run_latest<F, T>(&self, operation: F) -> OperationOutcome<T>
    where
        F: Future<Output = T>,
    {
        let token = self.next();
        let output = operation.await;
        if self.is_current(token) {
            OperationOutcome::Committed(output)
        } else {
            OperationOutcome::Superseded
        }
    }
}

/// Independent flows that each keep their own latest-wins counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Search,
    Dictionary,
    Translation,
}

/// One channel per [`Channel`]
#[derive(Debug, Default)]
pub struct OperationTokens {
    search: TokenChannel,
    dictionary: TokenChannel,
    translation: TokenChannel,
}

impl OperationTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, channel: Channel) -> &TokenChannel {
        match channel {
            Channel::Search => &self.search,
            Channel::Dictionary => &self.dictionary,
            Channel::Translation => &self.translation,
        }
    }

    pub fn next_token(&self, channel: Channel) -> OperationToken {
        self.channel(channel).next()
    }

    pub fn is_current(&self, channel: Channel, token: OperationToken) -> bool {
        self.channel(channel).is_current(token)
    }

    /// Supersede everything in flight, as on document teardown
    pub fn invalidate_all(&self) {
        self.search.invalidate();
        self.dictionary.invalidate();
        self.translation.invalidate();
    }
}

/// Result of a latest-wins operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome<T> {
    Committed(T),
    /// A newer operation started; the output was discarded
    Superseded,
}

impl<T> OperationOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, OperationOutcome::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            OperationOutcome::Committed(value) => Some(value),
            OperationOutcome::Superseded => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationOutcome<U> {
        match self {
            OperationOutcome::Committed(value) => OperationOutcome::Committed(f(value)),
            OperationOutcome::Superseded => OperationOutcome::Superseded,
        }
    }
}
