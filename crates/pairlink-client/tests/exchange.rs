//! Initiator and responder talking over loopback TCP.

use pairlink_client::{
    Client, ClientConfig, DeviceRegistry, ExchangeError, ExchangeOutcome, Handlers,
    MemoryDeviceRegistry, MemoryPeripheralStore, NotificationSink, PeripheralStore,
    TransportConfig, serve,
};
use pairlink_core::{Device, PeripheralRecord, Reachability};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
struct Shown(Mutex<Vec<(String, String)>>);

impl NotificationSink for Shown {
    fn show(&self, title: &str, body: &str) {
        self.0.lock().unwrap().push((title.into(), body.into()));
    }
}

struct Responder {
    device: Device,
    store: Arc<MemoryPeripheralStore>,
    shown: Arc<Shown>,
}

async fn responder(peripherals: Vec<PeripheralRecord>) -> Responder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let store = Arc::new(MemoryPeripheralStore::new(peripherals));
    let shown = Arc::new(Shown::default());
    let handlers = Handlers::new(store.clone(), shown.clone());
    tokio::spawn(serve(listener, handlers, TransportConfig::default()));

    Responder {
        device: Device::new("responder", "127.0.0.1", port),
        store,
        shown,
    }
}

fn client() -> Client {
    Client::new(ClientConfig {
        response_timeout: Duration::from_secs(5),
        ..Default::default()
    })
}

#[tokio::test]
async fn sync_then_connect_all() {
    let r = responder(Vec::new()).await;
    let client = client();

    let records = vec![
        PeripheralRecord::new("m1", "Mouse").with_attribute("battery", json!(90)),
        PeripheralRecord::new("k1", "Keyboard"),
    ];
    assert_eq!(
        client.sync_peripherals(&r.device, &records).await.unwrap(),
        ExchangeOutcome::Succeeded
    );
    assert_eq!(r.store.peripherals(), records);

    assert_eq!(
        client.connect_all(&r.device).await.unwrap(),
        ExchangeOutcome::Succeeded
    );
    assert!(r.store.is_connected("m1"));
    assert!(r.store.is_connected("k1"));
}

#[tokio::test]
async fn sync_empty_list_clears_store() {
    let r = responder(vec![PeripheralRecord::new("m1", "Mouse")]).await;
    assert_eq!(
        client().sync_peripherals(&r.device, &[]).await.unwrap(),
        ExchangeOutcome::Succeeded
    );
    assert!(r.store.is_empty());
}

#[tokio::test]
async fn unregister_all_on_empty_store_succeeds() {
    let r = responder(Vec::new()).await;
    assert_eq!(
        client().unregister_all(&r.device).await.unwrap(),
        ExchangeOutcome::Succeeded
    );
}

#[tokio::test]
async fn notification_is_delivered_and_shown() {
    let r = responder(Vec::new()).await;
    assert_eq!(
        client()
            .send_notification(&r.device, "Battery low", "Mouse at 5%")
            .await
            .unwrap(),
        ExchangeOutcome::Delivered
    );

    // Delivery only means written; wait for the responder to process it.
    for _ in 0..50 {
        if !r.shown.0.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        *r.shown.0.lock().unwrap(),
        vec![("Battery low".to_string(), "Mouse at 5%".to_string())]
    );
}

#[tokio::test]
async fn concurrent_exchanges_share_one_store() {
    let r = responder(vec![
        PeripheralRecord::new("a", "A"),
        PeripheralRecord::new("b", "B"),
    ])
    .await;
    let client = client();

    let (first, second) = tokio::join!(client.connect_all(&r.device), client.connect_all(&r.device));
    assert_eq!(first.unwrap(), ExchangeOutcome::Succeeded);
    assert_eq!(second.unwrap(), ExchangeOutcome::Succeeded);
    assert!(r.store.is_connected("a") && r.store.is_connected("b"));
}

#[tokio::test]
async fn unreachable_device_recorded_in_registry() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let device = Device::new("gone", "127.0.0.1", port);
    let registry = Arc::new(MemoryDeviceRegistry::new(vec![device.clone()]));
    let client = client().with_registry(registry.clone());

    let err = client.connect_all(&device).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Protocol(_)));
    assert!(matches!(
        registry.devices()[0].reachability,
        Reachability::Unreachable { .. }
    ));
}

#[tokio::test]
async fn reachable_device_recorded_in_registry() {
    let r = responder(Vec::new()).await;
    let registry = Arc::new(MemoryDeviceRegistry::new(vec![r.device.clone()]));
    client()
        .with_registry(registry.clone())
        .connect_all(&r.device)
        .await
        .unwrap();
    assert_eq!(
        registry.find("responder").unwrap().reachability,
        Reachability::Reachable
    );
}
