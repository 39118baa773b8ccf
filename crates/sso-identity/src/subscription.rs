//! Auth-state subscriptions
//!
//! The identity SDK reports every sign-in and sign-out to its subscribers, in
//! order, starting with the state at the time of subscribing. Dropping the
//! [`AuthStateSubscription`] releases it; the SDK stops delivering to closed
//! subscriptions.

use crate::user::UserRef;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A reported auth state: `Some` when signed in, `None` when signed out.
pub type AuthStateChange = Option<UserRef>;

/// Subscription handle for receiving auth-state changes.
#[derive(Debug)]
pub struct AuthStateSubscription {
    /// Subscription ID
    pub id: Uuid,
    receiver: mpsc::UnboundedReceiver<AuthStateChange>,
}

impl AuthStateSubscription {
    /// Create a subscription and the sender the SDK delivers through.
    pub fn channel() -> (mpsc::UnboundedSender<AuthStateChange>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = Self {
            id: Uuid::now_v7(),
            receiver,
        };
        (sender, subscription)
    }

    /// Receive the next auth-state change.
    ///
    /// Returns `None` once the SDK side has gone away.
    pub async fn next(&mut self) -> Option<AuthStateChange> {
        self.receiver.recv().await
    }

    /// Release the subscription.
    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_order() {
        let (sender, mut subscription) = AuthStateSubscription::channel();

        sender.send(None).unwrap();
        sender.send(None).unwrap();
        drop(sender);

        assert!(matches!(subscription.next().await, Some(None)));
        assert!(matches!(subscription.next().await, Some(None)));
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_sender() {
        let (sender, subscription) = AuthStateSubscription::channel();
        assert!(!sender.is_closed());

        subscription.unsubscribe();
        assert!(sender.is_closed());
        assert!(sender.send(None).is_err());
    }
}
