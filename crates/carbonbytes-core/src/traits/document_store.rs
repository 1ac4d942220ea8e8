//! Document store trait for pluggable store backends.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use crate::result::AppResult;
use crate::types::document::{Document, Patch, Query, WriteMode};

/// Sending half of a [`Subscription`], held by the store provider.
pub type SubscriptionSender<T> = mpsc::Sender<AppResult<T>>;

/// A live, cancellable sequence of snapshots.
///
/// The sequence is infinite while the provider keeps it open. Dropping the
/// subscription unsubscribes; providers notice through a failed send or
/// [`mpsc::Sender::closed`].
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<AppResult<T>>,
}

impl<T> Subscription<T> {
    /// Create a subscription and the sender a provider pushes snapshots into.
    pub fn channel(buffer: usize) -> (SubscriptionSender<T>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Wait for the next snapshot. `None` once the provider closed the feed.
    pub async fn recv(&mut self) -> Option<AppResult<T>> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = AppResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Trait for the shared, remote key-document store.
///
/// Documents are addressed by `(collection, id)`. Implementations map their
/// failures into the shared error taxonomy: a missing document on `get` is
/// `Ok(None)`, not an error; authorization failures are `PermissionDenied`;
/// network failures are `Transient`.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug + 'static {
    /// Read a document. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Write a patch to a document using the given mode.
    async fn set(&self, collection: &str, id: &str, patch: Patch, mode: WriteMode)
    -> AppResult<()>;

    /// Run a query against a collection.
    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Document>>;

    /// Subscribe to a single document. The first snapshot is the current
    /// state; `None` means the document does not exist (or was deleted).
    async fn watch(&self, collection: &str, id: &str)
    -> AppResult<Subscription<Option<Document>>>;

    /// Subscribe to a query. The first snapshot is the current result set.
    async fn watch_query(
        &self,
        collection: &str,
        query: &Query,
    ) -> AppResult<Subscription<Vec<Document>>>;

    /// Check that the store backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let (tx, mut sub) = Subscription::<u32>::channel(4);
        tx.send(Ok(1)).await.unwrap();
        drop(tx);
        assert_eq!(sub.recv().await.unwrap().unwrap(), 1);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_sender_sees_unsubscribe() {
        let (tx, sub) = Subscription::<u32>::channel(4);
        drop(sub);
        assert!(tx.send(Ok(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        let (tx, sub) = Subscription::<u32>::channel(4);
        tx.send(Ok(7)).await.unwrap();
        drop(tx);
        let items: Vec<_> = sub.collect().await;
        assert_eq!(items.len(), 1);
    }
}
