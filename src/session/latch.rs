#![forbid(unsafe_code)]

// Single-settlement latch for the login future

use tokio::sync::oneshot;

use super::SessionError;

pub type LoginResult = Result<(), SessionError>;

/// Write side of the login future. Only the first `settle` is delivered.
#[derive(Debug)]
pub struct LoginLatch {
    tx: Option<oneshot::Sender<LoginResult>>,
}

impl LoginLatch {
    pub fn new() -> (Self, oneshot::Receiver<LoginResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Returns `false` when the latch had already settled; the result is dropped.
    pub fn settle(&mut self, result: LoginResult) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // A dropped receiver still counts as settled.
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_settlement_wins() {
        let (mut latch, rx) = LoginLatch::new();
        assert!(!latch.is_settled());
        assert!(latch.settle(Err(SessionError::Protocol("boom".into()))));
        assert!(!latch.settle(Ok(())));
        assert!(!latch.settle(Err(SessionError::Kicked("late".into()))));
        assert!(latch.is_settled());
        assert_eq!(rx.await.unwrap(), Err(SessionError::Protocol("boom".into())));
    }

    #[test]
    fn test_settle_without_listener() {
        let (mut latch, rx) = LoginLatch::new();
        drop(rx);
        assert!(latch.settle(Ok(())));
        assert!(!latch.settle(Ok(())));
    }
}
