//! Command handlers.
//!
//! Each handler performs its side effect through a collaborator and returns
//! the response token to send back, if any.

use crate::store::{NotificationSink, PeripheralStore};
use pairlink_core::{Command, Invocation, NotificationPayload, PeripheralSyncPayload};
use std::sync::Arc;

/// The side-effecting half of a responder.
#[derive(Clone)]
pub struct Handlers {
    store: Arc<dyn PeripheralStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl Handlers {
    pub fn new(store: Arc<dyn PeripheralStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    /// Run one invocation and return the reply to send, if any.
    pub fn handle(&self, invocation: Invocation) -> Option<Command> {
        let Invocation { command, payload } = invocation;
        match (command, payload) {
            (Command::ConnectAll, _) => {
                let peripherals = self.store.peripherals();
                tracing::info!("Connecting {} peripheral(s)", peripherals.len());
                for peripheral in &peripherals {
                    self.store.connect(peripheral);
                }
                Some(Command::OperationSuccess)
            }
            (Command::UnregisterAll, _) => {
                let peripherals = self.store.peripherals();
                tracing::info!("Unregistering {} peripheral(s)", peripherals.len());
                for peripheral in &peripherals {
                    self.store.unregister(peripheral);
                }
                Some(Command::OperationSuccess)
            }
            (Command::SyncPeripherals, Some(payload)) => {
                match PeripheralSyncPayload::decode(&payload) {
                    Ok(sync) => {
                        self.store.replace_all(sync.peripherals);
                        Some(Command::OperationSuccess)
                    }
                    Err(e) => {
                        tracing::warn!("Rejecting peripheral sync: {}", e);
                        Some(Command::OperationFailed)
                    }
                }
            }
            // Notifications never get a reply, whether or not they display.
            (Command::Notification, Some(payload)) => {
                match NotificationPayload::decode(&payload) {
                    Ok(n) => self.notifier.show(&n.title, &n.body),
                    Err(e) => tracing::warn!("Dropping notification: {}", e),
                }
                None
            }
            (command, _) => {
                tracing::debug!("No handler for {}", command);
                Some(Command::OperationFailed)
            }
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryPeripheralStore;
    use pairlink_core::PeripheralRecord;
    use std::sync::Mutex;

    /// Notification sink that remembers what it was asked to show.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub shown: Mutex<Vec<(String, String)>>,
    }

    impl NotificationSink for RecordingNotifier {
        fn show(&self, title: &str, body: &str) {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    /// Peripheral store that counts calls.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryPeripheralStore,
        connects: Mutex<usize>,
    }

    impl PeripheralStore for CountingStore {
        fn peripherals(&self) -> Vec<PeripheralRecord> {
            self.inner.peripherals()
        }
        fn connect(&self, peripheral: &PeripheralRecord) {
            *self.connects.lock().unwrap() += 1;
            self.inner.connect(peripheral)
        }
        fn unregister(&self, peripheral: &PeripheralRecord) {
            self.inner.unregister(peripheral)
        }
        fn replace_all(&self, peripherals: Vec<PeripheralRecord>) {
            self.inner.replace_all(peripherals)
        }
    }

    fn invoke(command: Command, payload: Option<&str>) -> Invocation {
        Invocation {
            command,
            payload: payload.map(str::to_string),
        }
    }

    fn setup(
        peripherals: Vec<PeripheralRecord>,
    ) -> (Handlers, Arc<CountingStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(CountingStore {
            inner: MemoryPeripheralStore::new(peripherals),
            connects: Mutex::new(0),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        (
            Handlers::new(store.clone(), notifier.clone()),
            store,
            notifier,
        )
    }

    #[test]
    fn connect_all_with_no_peripherals() {
        let (handlers, store, _) = setup(Vec::new());
        let reply = handlers.handle(invoke(Command::ConnectAll, None));
        assert_eq!(reply, Some(Command::OperationSuccess));
        assert_eq!(*store.connects.lock().unwrap(), 0);
    }

    #[test]
    fn connect_all_connects_each() {
        let (handlers, store, _) = setup(vec![
            PeripheralRecord::new("a", "A"),
            PeripheralRecord::new("b", "B"),
        ]);
        assert_eq!(
            handlers.handle(invoke(Command::ConnectAll, None)),
            Some(Command::OperationSuccess)
        );
        assert_eq!(*store.connects.lock().unwrap(), 2);
        assert!(store.inner.is_connected("a") && store.inner.is_connected("b"));
    }

    #[test]
    fn unregister_all_empties_store() {
        let (handlers, store, _) = setup(vec![PeripheralRecord::new("a", "A")]);
        assert_eq!(
            handlers.handle(invoke(Command::UnregisterAll, None)),
            Some(Command::OperationSuccess)
        );
        assert!(store.inner.is_empty());
    }

    #[test]
    fn sync_replaces_or_fails() {
        let (handlers, store, _) = setup(vec![PeripheralRecord::new("a", "A")]);

        assert_eq!(
            handlers.handle(invoke(Command::SyncPeripherals, Some("not json"))),
            Some(Command::OperationFailed)
        );
        assert_eq!(store.inner.len(), 1);

        assert_eq!(
            handlers.handle(invoke(Command::SyncPeripherals, Some("[]"))),
            Some(Command::OperationSuccess)
        );
        assert!(store.inner.is_empty());
    }

    #[test]
    fn notification_shows_without_reply() {
        let (handlers, _, notifier) = setup(Vec::new());
        assert_eq!(
            handlers.handle(invoke(Command::Notification, Some("Hello|World"))),
            None
        );
        assert_eq!(
            *notifier.shown.lock().unwrap(),
            vec![("Hello".to_string(), "World".to_string())]
        );
    }

    #[test]
    fn bad_notification_is_dropped_silently() {
        let (handlers, _, notifier) = setup(Vec::new());
        assert_eq!(
            handlers.handle(invoke(Command::Notification, Some("NoSeparatorHere"))),
            None
        );
        assert!(notifier.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn responses_as_requests_fail() {
        let (handlers, _, _) = setup(Vec::new());
        assert_eq!(
            handlers.handle(invoke(Command::OperationSuccess, None)),
            Some(Command::OperationFailed)
        );
        assert_eq!(
            handlers.handle(invoke(Command::OperationFailed, None)),
            Some(Command::OperationFailed)
        );
    }
}
