use std::fmt;

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Observable value owned by the session task.
///
/// Consumers take a snapshot with [`get`](Self::get) or follow updates via
/// [`watch`](Self::watch); writes only happen inside the crate, so every
/// change is serialized through the event loop.
#[derive(Clone)]
pub struct Property<T> {
    tx: watch::Sender<T>,
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    pub(crate) fn new(initial: T) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self { tx, rx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Stream that yields the current value and then every change.
    pub fn watch(&self) -> impl Stream<Item = T> + Send + use<T> {
        WatchStream::new(self.rx.clone())
    }

    /// Stores `value`, notifying watchers. Returns whether it differed from
    /// the previous value.
    pub(crate) fn set(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property({:?})", self.get())
    }
}
