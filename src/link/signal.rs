use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A signal that fires once its handle is closed or dropped.
pub fn close_signal() -> (CloseHandle, CloseSignal) {
    let (tx, rx) = oneshot::channel();

    (CloseHandle { tx: Some(tx) }, CloseSignal { rx })
}

pub struct CloseHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl CloseHandle {
    pub fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct CloseSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for CloseSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, both mean close.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
