// Location-scoped view over the REST API.
//
// Resolves the authenticated member and its single location once, caches
// both for the client's lifetime, and scopes mode/device operations to
// that location. Mode and device reads are never cached -- each call
// re-fetches.

use tokio::sync::Mutex;
use tracing::debug;

use crate::client::RestClient;
use crate::error::Error;
use crate::models::{Device, Hub, Location, Member, Mode};

#[derive(Debug, Default)]
struct ResolvedAccount {
    member: Option<Member>,
    location: Option<Location>,
}

/// Read/write operations scoped to the account's single location.
///
/// Exactly one location per session is supported: the first location the
/// API returns is authoritative. A member with zero locations fails with
/// [`Error::NoLocation`] instead of indexing past the end.
#[derive(Debug)]
pub struct LocationClient {
    client: RestClient,
    resolved: Mutex<ResolvedAccount>,
}

impl LocationClient {
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            resolved: Mutex::new(ResolvedAccount::default()),
        }
    }

    /// The resolved location, fetching member and location list on first use.
    pub async fn current_location(&self) -> Result<Location, Error> {
        let mut resolved = self.resolved.lock().await;
        if let Some(location) = resolved.location.as_ref() {
            return Ok(location.clone());
        }

        let member = match resolved.member.as_ref() {
            Some(member) => member.clone(),
            None => {
                let member = self.client.current_member().await?;
                resolved.member = Some(member.clone());
                member
            }
        };

        let locations = self.client.member_locations(&member.id).await?;
        let location = locations.into_iter().next().ok_or(Error::NoLocation)?;
        debug!(location = %location.name, id = %location.id, "resolved location");

        resolved.location = Some(location.clone());
        Ok(location)
    }

    /// Security modes for the current location. Uncached.
    pub async fn modes(&self) -> Result<Vec<Mode>, Error> {
        let location = self.current_location().await?;
        self.client.location_modes(&location.id).await
    }

    /// All devices at the current location. Uncached.
    pub async fn devices(&self) -> Result<Vec<Device>, Error> {
        let location = self.current_location().await?;
        self.client.location_devices(&location.id).await
    }

    /// A single device by id.
    pub async fn device(&self, device_id: &str) -> Result<Device, Error> {
        self.client.device(device_id).await
    }

    /// The hub installed at the current location.
    pub async fn hub(&self) -> Result<Hub, Error> {
        let location = self.current_location().await?;
        self.client.location_hub(&location.id).await
    }

    /// Request a mode state change (`"arming"` / `"disarm"`).
    pub async fn update_mode_state(&self, mode_id: &str, state: &str) -> Result<(), Error> {
        self.client.update_mode_state(mode_id, state).await
    }
}
