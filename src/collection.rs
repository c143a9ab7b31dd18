use crate::config::ClientOptions;
use crate::device::Device;
use crate::error::ShellyError;
use crate::models::ModelRegistry;
use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use crate::types::{DeviceId, DeviceIdentifiers};
use futures_util::future::BoxFuture;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Source of device identifiers (mDNS, a static list, a cloud account...)
pub trait Discoverer: Send + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Report devices on `found` until done or until `cancel` fires
    fn run(
        self: Box<Self>,
        found: mpsc::Sender<DeviceIdentifiers>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()>;
}

/// Discoverer reporting a fixed list of devices once
#[derive(Debug, Clone, Default)]
pub struct StaticDiscoverer {
    devices: Vec<DeviceIdentifiers>,
}

impl StaticDiscoverer {
    pub fn new(devices: impl IntoIterator<Item = DeviceIdentifiers>) -> Self {
        Self {
            devices: devices.into_iter().collect(),
        }
    }

    /// Add a device by id and hostname
    pub fn with_host(mut self, device_id: impl Into<DeviceId>, hostname: impl Into<String>) -> Self {
        self.devices.push(DeviceIdentifiers::new(device_id, hostname));
        self
    }
}

impl Discoverer for StaticDiscoverer {
    fn name(&self) -> &str {
        "static"
    }

    fn run(
        self: Box<Self>,
        found: mpsc::Sender<DeviceIdentifiers>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            for identifiers in self.devices {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = found.send(identifiers) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    }
}

/// Why a discovered device was not added
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingHostname,
    UnknownModel(String),
    ConnectFailed(String),
}

impl From<&ShellyError> for SkipReason {
    fn from(error: &ShellyError) -> Self {
        match error {
            ShellyError::MissingHostname(_) => SkipReason::MissingHostname,
            ShellyError::UnknownModel { model, .. } => SkipReason::UnknownModel(model.clone()),
            other => SkipReason::ConnectFailed(other.to_string()),
        }
    }
}

/// Changes to the device collection
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Added(Device),
    Removed(DeviceId),
    Skipped {
        device_id: DeviceId,
        reason: SkipReason,
    },
}

/// Known and in-flight devices. From discovery until removal an id is in
/// exactly one of the two.
#[derive(Default)]
struct Members {
    devices: BTreeMap<DeviceId, Device>,
    /// Devices currently being opened
    opening: HashSet<DeviceId>,
}

struct CollectionInner {
    registry: ModelRegistry,
    options: ClientOptions,
    members: Mutex<Members>,
    discoverers: Mutex<Vec<JoinHandle<()>>>,
    opens: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<CollectionEvent>,
    cancel: CancellationToken,
}

/// Collection of devices fed by one or more discoverers.
///
/// # Example
///
/// ```no_run
/// use shelly_gen2::{ClientOptions, CollectionEvent, ModelRegistry, Shellies, StaticDiscoverer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let shellies = Shellies::new(ModelRegistry::builtin(), ClientOptions::default());
///     let mut events = shellies.subscribe();
///
///     shellies.add_discoverer(StaticDiscoverer::default().with_host("shellyplus1-abc", "192.168.1.20"));
///
///     if let CollectionEvent::Added(device) = events.recv().await? {
///         println!("Found {} ({})", device.id(), device.model());
///     }
///
///     shellies.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Shellies {
    inner: Arc<CollectionInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shellies {
    pub fn new(registry: ModelRegistry, options: ClientOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CollectionInner {
                registry,
                options,
                members: Mutex::new(Members::default()),
                discoverers: Mutex::new(Vec::new()),
                opens: Mutex::new(Vec::new()),
                events,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// Subscribe to added, removed and skipped devices
    pub fn subscribe(&self) -> EventReceiver<CollectionEvent> {
        EventReceiver::new(self.inner.events.subscribe())
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        lock(&self.inner.members).devices.get(device_id).cloned()
    }

    /// Snapshot of every device, ordered by id
    pub fn devices(&self) -> Vec<Device> {
        lock(&self.inner.members).devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.members).devices.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.members).devices.is_empty()
    }

    /// Start a discoverer and open every device it reports
    pub fn add_discoverer(&self, discoverer: impl Discoverer) {
        if self.inner.cancel.is_cancelled() {
            tracing::warn!("Ignoring discoverer {}: collection is shut down", discoverer.name());
            return;
        }

        let name = discoverer.name().to_string();
        let (tx, mut rx) = mpsc::channel(32);
        let cancel = self.inner.cancel.child_token();

        tracing::info!("Starting discoverer {}", name);
        let discovery = tokio::spawn(Box::new(discoverer).run(tx, cancel.clone()));

        let collection = self.clone();
        let consumer = tokio::spawn(async move {
            loop {
                let identifiers = tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(identifiers) => identifiers,
                        None => break,
                    },
                };
                collection.discovered(identifiers);
            }
            tracing::debug!("Discoverer {} finished", name);
        });

        lock(&self.inner.discoverers).extend([discovery, consumer]);
    }

    fn discovered(&self, identifiers: DeviceIdentifiers) {
        let device_id = identifiers.device_id.clone();
        {
            let mut members = lock(&self.inner.members);
            if members.devices.contains_key(&device_id) || !members.opening.insert(device_id.clone()) {
                tracing::trace!("Device {} already known", device_id);
                return;
            }
        }

        let collection = self.clone();
        let handle = tokio::spawn(async move {
            let inner = &collection.inner;
            let opened = tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => None,
                opened = Device::open(&identifiers, &inner.options, &inner.registry) => Some(opened),
            };

            // Cancelled mid-open: dropping the half-open client closes its socket
            let Some(opened) = opened else {
                lock(&inner.members).opening.remove(&device_id);
                tracing::debug!("Stopped opening {}: collection is shut down", device_id);
                return;
            };

            match opened {
                Ok(device) => {
                    let added = {
                        let mut members = lock(&inner.members);
                        members.opening.remove(&device_id);
                        let keep = !inner.cancel.is_cancelled() && !members.devices.contains_key(&device_id);
                        if keep {
                            members.devices.insert(device_id.clone(), device.clone());
                        }
                        keep
                    };

                    if added {
                        tracing::info!("Added device {} ({})", device_id, device.model());
                        let _ = inner.events.send(CollectionEvent::Added(device));
                    } else {
                        device.destroy().await;
                    }
                }
                Err(e) => {
                    lock(&inner.members).opening.remove(&device_id);
                    tracing::warn!("Skipping device {}: {}", device_id, e);
                    let _ = inner.events.send(CollectionEvent::Skipped {
                        device_id,
                        reason: SkipReason::from(&e),
                    });
                }
            }
        });

        let mut opens = lock(&self.inner.opens);
        opens.retain(|task| !task.is_finished());
        opens.push(handle);
    }

    /// Destroy a device and drop it from the collection
    pub async fn remove(&self, device_id: &str) -> bool {
        let Some(device) = lock(&self.inner.members).devices.remove(device_id) else {
            return false;
        };
        device.destroy().await;
        let _ = self
            .inner
            .events
            .send(CollectionEvent::Removed(device_id.to_string()));
        true
    }

    /// Stop every discoverer, abandon devices still being opened and destroy
    /// every device
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for task in lock(&self.inner.discoverers).drain(..) {
            task.abort();
        }

        // Open tasks watch the token; wait so no connection outlives this call
        let opens: Vec<_> = lock(&self.inner.opens).drain(..).collect();
        for task in opens {
            if let Err(e) = task.await {
                tracing::debug!("Device open task failed: {}", e);
            }
        }

        let devices = std::mem::take(&mut lock(&self.inner.members).devices);
        for device in devices.into_values() {
            device.destroy().await;
        }
        tracing::info!("Device collection shut down");
    }
}
