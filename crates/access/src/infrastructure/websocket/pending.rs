//! Pending-request tracking for the remote client.

use std::collections::HashMap;

use tokio::sync::oneshot;

use mmi_shared::ResponseResult;

/// Response senders keyed by request_id.
#[derive(Default)]
pub struct PendingRequests {
    inner: HashMap<String, oneshot::Sender<ResponseResult>>,
}

impl PendingRequests {
    pub fn insert(&mut self, request_id: String, sender: oneshot::Sender<ResponseResult>) {
        self.inner.insert(request_id, sender);
    }

    pub fn remove(&mut self, request_id: &str) -> bool {
        self.inner.remove(request_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Resolve and remove a pending request.
    ///
    /// Returns true if a pending request was found.
    pub fn resolve(&mut self, request_id: &str, result: ResponseResult) -> bool {
        match self.inner.remove(request_id) {
            Some(sender) => {
                // the caller may have timed out already
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    /// Drop every sender; waiters observe a closed channel.
    pub fn clear(&mut self) -> usize {
        let count = self.inner.len();
        self.inner.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmi_domain::BoolResponse;
    use mmi_shared::AdapterReply;

    #[test]
    fn test_resolve_delivers_once() {
        let mut pending = PendingRequests::default();
        let (tx, mut rx) = oneshot::channel();
        pending.insert("r1".into(), tx);

        let reply = ResponseResult::success(AdapterReply::Bool(BoolResponse::ok()));
        assert!(pending.resolve("r1", reply.clone()));
        assert!(!pending.resolve("r1", reply));
        assert!(rx.try_recv().unwrap().is_success());
    }

    #[test]
    fn test_clear_cancels_waiters() {
        let mut pending = PendingRequests::default();
        let (tx, mut rx) = oneshot::channel();
        pending.insert("r1".into(), tx);

        assert_eq!(pending.clear(), 1);
        assert!(pending.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
