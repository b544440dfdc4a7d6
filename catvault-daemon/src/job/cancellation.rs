use tokio::sync::oneshot;

/// A stop request in flight to a worker. Acknowledging it only confirms the
/// signal was seen, not that the job stopped.
#[derive(Debug)]
pub struct Request {
    response_send: oneshot::Sender<()>,
}

impl Request {
    pub fn acknowledge(self) {
        if self.response_send.send(()).is_err() {
            tracing::warn!("response receiver dropped");
        }
    }
}

#[derive(Debug)]
pub struct Send(oneshot::Sender<Request>);

impl Send {
    /// Hands the stop signal to the worker and waits only for the
    /// acknowledgement that it was seen, never for the job to actually stop.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(self) {
        let (response_send, response_recv) = oneshot::channel();
        let request = Request { response_send };
        if self.0.send(request).is_err() {
            tracing::debug!("receiver dropped, job won't be cancelled");
        } else if let Err(error) = response_recv.await {
            tracing::debug!(%error, "response sender dropped");
        }
    }
}

#[derive(Debug)]
pub struct Recv(oneshot::Receiver<Request>);

impl Recv {
    pub async fn recv(&mut self) -> Request {
        match (&mut self.0).await {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(%error, "cancellation sender dropped, job will never be cancelled");
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub fn new() -> (Send, Recv) {
    let (send, recv) = oneshot::channel();
    (Send(send), Recv(recv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_hand_off_and_acknowledge_a_stop_signal() {
        let (send, mut recv) = new();

        let worker = tokio::spawn(async move {
            let request = recv.recv().await;
            request.acknowledge();
        });

        send.cancel().await;
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn should_resolve_cancel_when_the_receiver_was_dropped() {
        let (send, recv) = new();
        drop(recv);

        send.cancel().await;
    }
}
