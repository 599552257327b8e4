use crate::error::OperationError;
use crate::scheduler::lock;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::{oneshot, watch};

type Outcome<R> = Result<R, OperationError>;

/// Producer half of an operation's single-assignment result slot
///
/// The first `try_settle` wins; later attempts are ignored and report `false`.
pub(crate) struct CompletionSource<R> {
    sender: Mutex<Option<oneshot::Sender<Outcome<R>>>>,
    settled: watch::Sender<bool>,
}

impl<R> CompletionSource<R> {
    pub(crate) fn new() -> (Arc<Self>, Completion<R>) {
        let (sender, receiver) = oneshot::channel();
        let (settled, settled_rx) = watch::channel(false);
        let source = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            settled,
        });
        let completion = Completion {
            receiver,
            settled: settled_rx,
        };
        (source, completion)
    }

    /// Publish `outcome` unless the slot has already been settled
    pub(crate) fn try_settle(&self, outcome: Outcome<R>) -> bool {
        let mut sender = lock(&self.sender);
        match sender.take() {
            Some(tx) => {
                // The caller may have dropped its Completion; the slot still counts as settled.
                let _ = tx.send(outcome);
                self.settled.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub(crate) fn try_cancel(&self) -> bool {
        self.try_settle(Err(OperationError::Cancelled))
    }

    pub(crate) fn is_settled(&self) -> bool {
        lock(&self.sender).is_none()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.settled.subscribe()
    }

    /// Resolves once the slot has been settled by any path
    pub(crate) async fn settled(&self) {
        wait_settled(&mut self.subscribe()).await;
    }
}

/// Wait until `settled` flips to true or its sender goes away
pub(crate) async fn wait_settled(settled: &mut watch::Receiver<bool>) {
    loop {
        let done = *settled.borrow_and_update();
        if done || settled.changed().await.is_err() {
            return;
        }
    }
}

/// Caller half of an operation's result slot
///
/// Resolves exactly once with the operation's result, its failure, or
/// [`OperationError::Cancelled`]. If the scheduler shuts down before the
/// operation ran, resolves with [`OperationError::Abandoned`].
pub struct Completion<R> {
    receiver: oneshot::Receiver<Outcome<R>>,
    settled: watch::Receiver<bool>,
}

impl<R> Completion<R> {
    /// Whether the operation has reached a terminal state
    ///
    /// An abandoned operation counts as settled.
    pub fn is_settled(&self) -> bool {
        *self.settled.borrow() || self.settled.has_changed().is_err()
    }

    /// Take the outcome if it is already available, without waiting
    pub(crate) fn try_outcome(&mut self) -> Option<Outcome<R>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(OperationError::Abandoned)),
        }
    }
}

impl<R> Future for Completion<R> {
    type Output = Outcome<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(OperationError::Abandoned)))
    }
}

impl<R> std::fmt::Debug for Completion<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}
