// ── Integration façade ──
//
// Wires the full component graph for one Scout account: credential
// session -> REST client -> location client, the push listener, the
// alarm panel, and the device store. Owns background task lifecycles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scout_api::models::Location;
use scout_api::{Listener, LocationClient, RestClient, Session};

use crate::config::ScoutConfig;
use crate::error::CoreError;
use crate::panel::AlarmPanel;
use crate::store::DeviceStore;

/// One connected Scout Alarm account.
pub struct ScoutAlarm {
    session: Arc<Session>,
    location: Arc<LocationClient>,
    listener: Listener,
    panel: Arc<AlarmPanel>,
    store: Arc<DeviceStore>,
    device_poll_interval: Duration,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScoutAlarm {
    /// Build the component graph. Does not touch the network -- call
    /// [`connect`](Self::connect) to authenticate and subscribe. Must be
    /// called from within a Tokio runtime.
    pub fn new(config: ScoutConfig) -> Result<Self, CoreError> {
        let session = match config.base_url {
            Some(url) => Session::with_base_url(url, config.username, config.password),
            None => Session::new(config.username, config.password),
        }
        .map_err(CoreError::from)?;
        let session = Arc::new(session);

        let client = RestClient::new(Arc::clone(&session))?;
        let location = Arc::new(LocationClient::new(client));
        let listener = Listener::new(Arc::clone(&session))?;
        let panel = AlarmPanel::new(Arc::clone(&location), config.modes, config.reconcile);
        let store = DeviceStore::new(Arc::clone(&location));

        Ok(Self {
            session,
            location,
            listener,
            panel,
            store,
            device_poll_interval: config.device_poll_interval,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Authenticate, open the push channel, subscribe the location, and
    /// take the first snapshots.
    ///
    /// Fails fast on rejected credentials before anything is spawned.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.session.token().await.map_err(CoreError::from)?;
        let resolved = self.location.current_location().await?;

        let socket_id = self.listener.connect().await?;
        info!(socket_id = %socket_id, "push channel connected");

        // Handlers before the subscription so no event slips past them.
        self.panel.attach(&self.listener).await?;
        self.store.attach(&self.listener).await?;
        self.listener.add_location(&resolved.id).await?;

        self.panel.refresh().await?;
        self.store.refresh_all().await?;

        info!(location = %resolved.name, "connected");
        Ok(())
    }

    /// Spawn the slow background device poll at the configured interval.
    ///
    /// Device endpoints are rate limited, so this runs on a long fixed
    /// interval; pushed device events cover the realtime path.
    pub fn spawn_device_poll(&self) {
        let interval = self.device_poll_interval;
        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = store.refresh_all().await {
                            warn!(error = %e, "background device poll failed");
                        }
                    }
                }
            }
        });

        self.tasks.lock().unwrap().push(handle);
    }

    /// Stop background tasks and the push channel.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.listener.shutdown();

        let handles: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("shut down");
    }

    // ── Component accessors ──────────────────────────────────────────

    pub fn panel(&self) -> &Arc<AlarmPanel> {
        &self.panel
    }

    pub fn devices(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub async fn location(&self) -> Result<Location, CoreError> {
        Ok(self.location.current_location().await?)
    }
}
