use std::{pin::Pin, sync::Arc};

use tokio::sync::{Notify, mpsc};

pub type DrainTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Decouples publishers from a slow subscriber: publishing never blocks and
/// never drops, the drain task applies back-pressure on its own.
pub struct IsolatedForwarder<T> {
    inbox_tx: mpsc::UnboundedSender<T>,
}

pub struct StartupTasks {
    pub tokio: Vec<DrainTask>,
}

impl<T: Send + 'static> IsolatedForwarder<T> {
    pub fn new(
        output_buffer: usize,
        notify_any: Arc<Notify>,
    ) -> (IsolatedForwarder<T>, mpsc::Receiver<T>, DrainTask) {
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<T>();
        let (out_tx, out_rx) = mpsc::channel::<T>(output_buffer);

        let drain_task = Box::pin(async move {
            while let Some(value) = inbox_rx.recv().await {
                if out_tx.send(value).await.is_err() {
                    break;
                }
                notify_any.notify_one();
            }
        });

        (IsolatedForwarder { inbox_tx }, out_rx, drain_task)
    }

    /// Fails only once the subscriber side is gone.
    pub fn try_send(&self, value: T) -> Result<(), T> {
        self.inbox_tx.send(value).map_err(|e| e.0)
    }
}
