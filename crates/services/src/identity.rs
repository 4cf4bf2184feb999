use reskill_core::model::UserId;
use tokio::sync::watch;

/// Publishes the signed-in user, or `None` when signed out.
///
/// Cheap to clone; every clone publishes to the same channel.
#[derive(Clone, Debug)]
pub struct IdentityProvider {
    tx: watch::Sender<Option<UserId>>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn sign_in(&self, user: UserId) {
        self.publish(Some(user));
    }

    pub fn sign_out(&self) {
        self.publish(None);
    }

    #[must_use]
    pub fn current(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }

    // Re-publishing the same identity does not wake subscribers.
    fn publish(&self, next: Option<UserId>) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
