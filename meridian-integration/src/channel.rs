/// A bounded channel sender, used for the `Enqueueable` combinator's blocking mode
/// (`spec.md` §4.C) where the producer thread should apply back-pressure to the source, and for
/// the transaction handler's request queue (`spec.md` §4.G), which is itself the back-pressure
/// point for synchronous strategy code.
#[derive(Debug, Clone)]
pub struct BoundedTx<T> {
    tx: tokio::sync::mpsc::Sender<T>,
}

impl<T> BoundedTx<T> {
    pub fn new(tx: tokio::sync::mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    /// Blocking send used by a producer thread that is not itself on the async runtime.
    pub fn blocking_send(&self, item: T) -> Result<(), tokio::sync::mpsc::error::SendError<T>> {
        self.tx.blocking_send(item)
    }

    pub async fn send(&self, item: T) -> Result<(), tokio::sync::mpsc::error::SendError<T>> {
        self.tx.send(item).await
    }
}

pub fn bounded<T>(capacity: usize) -> (BoundedTx<T>, tokio::sync::mpsc::Receiver<T>) {
    let (tx, rx) = tokio::sync::mpsc::channel(capacity);
    (BoundedTx::new(tx), rx)
}
