// ── Device store ──
//
// In-memory cache of the location's device snapshots. Bulk polls replace
// the cache wholesale; push events replace single devices; a rate-limited
// single-device poll deliberately leaves the cached entry alone instead
// of overwriting it with an error body.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use scout_api::models::Device;
use scout_api::{Error as ApiError, Listener, LocationClient};

use crate::error::CoreError;

const UPDATE_CHANNEL_SIZE: usize = 256;

/// Reactive cache of the location's devices, keyed by device id.
pub struct DeviceStore {
    location: Arc<LocationClient>,
    devices: DashMap<String, Arc<Device>>,
    update_tx: broadcast::Sender<Arc<Device>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new(location: Arc<LocationClient>) -> Arc<Self> {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        let (last_refresh, _) = watch::channel(None);
        Arc::new(Self {
            location,
            devices: DashMap::new(),
            update_tx,
            last_refresh,
        })
    }

    /// Subscribe this store to the listener's device-change stream.
    /// Pushed events carry a full replacement device.
    pub async fn attach(self: &Arc<Self>, listener: &Listener) -> Result<(), CoreError> {
        let store = Arc::clone(self);
        listener
            .on_device_change(move |device| store.apply_push(device.clone()))
            .await?;
        Ok(())
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.get(device_id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// When the last successful bulk refresh completed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// Broadcast of every device replacement (poll or push).
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Device>> {
        self.update_tx.subscribe()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Bulk poll: fetch every device at the location and replace the
    /// cache wholesale.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let fetched = self.location.devices().await?;

        self.devices.clear();
        for device in fetched {
            let device = Arc::new(device);
            self.devices.insert(device.id.clone(), Arc::clone(&device));
            let _ = self.update_tx.send(device);
        }

        let _ = self.last_refresh.send(Some(Utc::now()));
        debug!(devices = self.devices.len(), "device snapshot replaced");
        Ok(())
    }

    /// Poll one device and replace its cache entry.
    ///
    /// The single-device endpoint is aggressively rate limited; on 429 the
    /// previous snapshot is kept so consumers see stale-but-real data
    /// rather than nothing.
    pub async fn refresh_device(&self, device_id: &str) -> Result<(), CoreError> {
        match self.location.device(device_id).await {
            Ok(device) => {
                let device = Arc::new(device);
                self.devices.insert(device.id.clone(), Arc::clone(&device));
                let _ = self.update_tx.send(device);
                Ok(())
            }
            Err(ApiError::RateLimited { path }) => {
                warn!(device_id = %device_id, path = %path, "rate limited, keeping cached device");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a pushed full-replacement device.
    pub fn apply_push(&self, device: Device) {
        debug!(device_id = %device.id, "device replaced from push");
        let device = Arc::new(device);
        self.devices.insert(device.id.clone(), Arc::clone(&device));
        let _ = self.update_tx.send(device);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use scout_api::{RestClient, Session};

    use super::*;

    async fn store_for(server: &MockServer) -> Arc<DeviceStore> {
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jwt": "jwt-1" })))
            .mount(server)
            .await;

        let session = Arc::new(
            Session::with_base_url(
                server.uri().parse().unwrap(),
                "user@example.com",
                SecretString::from("pw".to_string()),
            )
            .unwrap(),
        );
        let location = Arc::new(LocationClient::new(RestClient::new(session).unwrap()));
        DeviceStore::new(location)
    }

    fn device_json(id: &str, state: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "door_panel",
            "name": "Front Door",
            "reported": { "trigger": { "state": state } }
        })
    }

    #[tokio::test]
    async fn rate_limited_poll_keeps_cached_device() {
        let server = MockServer::start().await;
        let store = store_for(&server).await;

        let cached: Device = serde_json::from_value(device_json("d1", "open")).unwrap();
        store.apply_push(cached);

        Mock::given(method("GET"))
            .and(path("/devices/d1"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        store.refresh_device("d1").await.unwrap();

        let kept = store.device("d1").unwrap();
        let reported = kept.reported.clone().unwrap();
        assert_eq!(
            reported.trigger.unwrap().state,
            scout_api::models::TriggerState::Simple("open".into())
        );
    }

    #[tokio::test]
    async fn successful_poll_replaces_cached_device() {
        let server = MockServer::start().await;
        let store = store_for(&server).await;

        let cached: Device = serde_json::from_value(device_json("d1", "open")).unwrap();
        store.apply_push(cached);

        Mock::given(method("GET"))
            .and(path("/devices/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_json("d1", "close")))
            .mount(&server)
            .await;

        store.refresh_device("d1").await.unwrap();

        let replaced = store.device("d1").unwrap();
        let reported = replaced.reported.clone().unwrap();
        assert_eq!(
            reported.trigger.unwrap().state,
            scout_api::models::TriggerState::Simple("close".into())
        );
    }

    #[tokio::test]
    async fn pushed_device_broadcasts_to_subscribers() {
        let server = MockServer::start().await;
        let store = store_for(&server).await;
        let mut updates = store.subscribe();

        let device: Device = serde_json::from_value(device_json("d2", "open")).unwrap();
        store.apply_push(device);

        let update = updates.try_recv().unwrap();
        assert_eq!(update.id, "d2");
        assert_eq!(store.len(), 1);
    }
}
