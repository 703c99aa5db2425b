use std::fmt::{Debug, Formatter};

use tokio::sync::{mpsc, oneshot};

use crate::common::error::ClusterWatchError;

/// Can be used to respond to a request sent to a service.
#[must_use = "response token should be used to respond to a request"]
pub struct ResponseToken<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Debug for ResponseToken<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Response token")
    }
}

impl<T> ResponseToken<T> {
    pub fn respond(self, response: T) {
        if self.sender.send(response).is_err() {
            log::warn!("Could not send response to a service request, the caller hung up");
        }
    }
}

pub type RpcSender<T> = mpsc::UnboundedSender<T>;
pub type RpcReceiver<T> = mpsc::UnboundedReceiver<T>;

pub fn make_rpc_queue<T>() -> (RpcSender<T>, RpcReceiver<T>) {
    mpsc::unbounded_channel()
}

/// Sends a message created by `make_request` and waits until the service resolves its
/// response token.
pub async fn request<T, Response>(
    sender: &RpcSender<T>,
    make_request: impl FnOnce(ResponseToken<Response>) -> T,
) -> crate::Result<Response> {
    let (tx, rx) = oneshot::channel::<Response>();
    let token = ResponseToken { sender: tx };
    if sender.send(make_request(token)).is_err() {
        return Err(ClusterWatchError::GenericError(
            "The monitoring service is not running".to_string(),
        ));
    }
    rx.await.map_err(|_| {
        ClusterWatchError::GenericError("The monitoring service dropped the request".to_string())
    })
}
