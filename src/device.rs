use crate::component::{
    Component, ComponentKind, Cover, Input, Light, ShellyMethods, Switch, Sys, Wifi,
};
use crate::config::ClientOptions;
use crate::error::{Result, ShellyError};
use crate::models::{ComponentRef, ModelRegistry};
use crate::protocol::{EventNotification, StatusNotification};
use crate::rpc::RpcClient;
use crate::subscription::EventReceiver;
use crate::transport::{ConnectionState, TransportEvent};
use crate::types::{DeviceIdentifiers, DeviceIdentity};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::JoinHandle;

struct DeviceInner {
    identity: DeviceIdentity,
    rpc: RpcClient,
    /// In model declaration order
    components: Vec<Arc<Component>>,
    hydrated: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// A connected device: its RPC client and the components it carries.
///
/// Status and event pushes from the device are routed to the matching
/// components as they arrive. Status is reloaded whenever the connection is
/// re-established.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Connect to a discovered device, identify it and load its status
    pub async fn open(
        identifiers: &DeviceIdentifiers,
        options: &ClientOptions,
        registry: &ModelRegistry,
    ) -> Result<Self> {
        let hostname = identifiers
            .hostname()
            .ok_or_else(|| ShellyError::MissingHostname(identifiers.device_id.clone()))?;

        tracing::info!("Opening device {} at {}", identifiers.device_id, hostname);
        let rpc = RpcClient::for_host(hostname, options);

        let identity = match ShellyMethods::new(rpc.clone()).get_device_info().await {
            Ok(identity) => identity,
            Err(e) => {
                rpc.destroy().await;
                return Err(e);
            }
        };

        let Some(model) = registry.lookup(&identity.model) else {
            rpc.destroy().await;
            return Err(ShellyError::UnknownModel {
                device_id: identifiers.device_id.clone(),
                model: identity.model,
            });
        };

        let device = Self::new(identity, rpc, model.components.iter().copied());
        if let Err(e) = device.hydrate().await {
            device.destroy().await;
            return Err(e);
        }
        Ok(device)
    }

    /// Build a device around an existing RPC client.
    ///
    /// No request is sent; call [`load_status`](Self::load_status) to
    /// populate the components.
    pub fn new(
        identity: DeviceIdentity,
        rpc: RpcClient,
        components: impl IntoIterator<Item = ComponentRef>,
    ) -> Self {
        let components = components
            .into_iter()
            .map(|(kind, id)| Arc::new(Component::new(kind, id, rpc.clone())))
            .collect();

        let events = rpc.transport().subscribe();
        let inner = Arc::new(DeviceInner {
            identity,
            rpc,
            components,
            hydrated: AtomicBool::new(false),
            dispatcher: Mutex::new(None),
        });

        let handle = tokio::spawn(dispatch(Arc::downgrade(&inner), events));
        *inner.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Self { inner }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn id(&self) -> &str {
        &self.inner.identity.id
    }

    pub fn model(&self) -> &str {
        &self.inner.identity.model
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.inner.rpc
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.rpc.transport().state()
    }

    /// Subscribe to connection lifecycle and raw push events
    pub fn subscribe(&self) -> EventReceiver<TransportEvent> {
        self.inner.rpc.transport().subscribe()
    }

    /// Device-wide `Shelly.*` methods
    pub fn shelly(&self) -> ShellyMethods {
        ShellyMethods::new(self.inner.rpc.clone())
    }

    /// Every component, in model declaration order
    pub fn components(&self) -> &[Arc<Component>] {
        &self.inner.components
    }

    /// Look a component up by its status key, e.g. `switch:0`
    pub fn component(&self, key: &str) -> Option<&Arc<Component>> {
        self.inner.components.iter().find(|c| c.key() == key)
    }

    fn instance(&self, kind: ComponentKind, id: Option<u32>) -> Option<Arc<Component>> {
        self.inner
            .components
            .iter()
            .find(|c| c.kind() == kind && c.id() == id)
            .cloned()
    }

    pub fn switch(&self, id: u32) -> Option<Switch> {
        self.instance(ComponentKind::Switch, Some(id)).and_then(Switch::new)
    }

    pub fn cover(&self, id: u32) -> Option<Cover> {
        self.instance(ComponentKind::Cover, Some(id)).and_then(Cover::new)
    }

    pub fn light(&self, id: u32) -> Option<Light> {
        self.instance(ComponentKind::Light, Some(id)).and_then(Light::new)
    }

    pub fn input(&self, id: u32) -> Option<Input> {
        self.instance(ComponentKind::Input, Some(id)).and_then(Input::new)
    }

    pub fn wifi(&self) -> Option<Wifi> {
        self.instance(ComponentKind::Wifi, None).and_then(Wifi::new)
    }

    pub fn sys(&self) -> Option<Sys> {
        self.instance(ComponentKind::Sys, None).and_then(Sys::new)
    }

    /// Route a status push to the components it names. Unknown keys are
    /// ignored.
    pub fn handle_status(&self, status: &StatusNotification) {
        self.inner.handle_status(&status.components);
    }

    /// Route each event to the component that raised it. Events for unknown
    /// components are dropped.
    pub fn handle_events(&self, notification: &EventNotification) {
        self.inner.handle_events(notification);
    }

    /// Fetch `Shelly.GetStatus` and apply it to every component
    pub async fn load_status(&self) -> Result<()> {
        self.inner.load_status().await
    }

    /// Fetch `Shelly.GetConfig` and store each component's configuration
    pub async fn load_config(&self) -> Result<()> {
        let config = self.shelly().get_config().await?;
        let Value::Object(config) = config else {
            return Err(ShellyError::InvalidResponse(
                "Shelly.GetConfig did not return an object".to_string(),
            ));
        };
        for (key, value) in &config {
            if let Some(component) = self.component(key) {
                component.update_config(value);
            }
        }
        Ok(())
    }

    async fn hydrate(&self) -> Result<()> {
        self.load_status().await?;
        self.load_config().await?;
        self.inner.hydrated.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop routing pushes and close the connection. Pending requests fail
    /// with `ConnectionClosed`.
    pub async fn destroy(&self) {
        let dispatcher = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = dispatcher {
            handle.abort();
        }
        self.inner.rpc.destroy().await;
        tracing::info!("Device {} destroyed", self.id());
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id())
            .field("model", &self.model())
            .field("state", &self.state())
            .finish()
    }
}

impl DeviceInner {
    fn component(&self, key: &str) -> Option<&Arc<Component>> {
        self.components.iter().find(|c| c.key() == key)
    }

    fn handle_status(&self, status: &serde_json::Map<String, Value>) {
        for (key, value) in status {
            match self.component(key) {
                Some(component) => {
                    component.update(value);
                }
                None => tracing::trace!("{}: ignoring status for {}", self.identity.id, key),
            }
        }
    }

    fn handle_events(&self, notification: &EventNotification) {
        for event in &notification.events {
            let key = event.component_key();
            match self.component(&key) {
                Some(component) => component.handle_event(event),
                None => tracing::debug!(
                    "{}: dropping {} event for unknown component {}",
                    self.identity.id,
                    event.event,
                    key
                ),
            }
        }
    }

    async fn load_status(&self) -> Result<()> {
        let status = self.rpc.request("Shelly.GetStatus", None).await?;
        match status {
            Value::Object(status) => {
                self.handle_status(&status);
                Ok(())
            }
            _ => Err(ShellyError::InvalidResponse(
                "Shelly.GetStatus did not return an object".to_string(),
            )),
        }
    }
}

/// Route transport pushes into the device until it is dropped or destroyed
async fn dispatch(weak: Weak<DeviceInner>, mut events: EventReceiver<TransportEvent>) {
    loop {
        let event = events.recv().await;
        let Some(device) = weak.upgrade() else {
            break;
        };

        match event {
            Ok(TransportEvent::StatusUpdate(status)) => device.handle_status(&status.components),
            Ok(TransportEvent::Event(notification)) => device.handle_events(&notification),
            Ok(TransportEvent::Connect) if device.hydrated.load(Ordering::SeqCst) => {
                tracing::info!("{}: reconnected, reloading status", device.identity.id);
                reload_status(device);
            }
            Ok(_) => {}
            Err(ShellyError::ChannelError(e)) => {
                tracing::warn!("{}: missed pushes ({}), reloading status", device.identity.id, e);
                if device.hydrated.load(Ordering::SeqCst) {
                    reload_status(device);
                }
            }
            Err(_) => break,
        }
    }
}

/// Reload in the background; the dispatch loop keeps routing pushes meanwhile
fn reload_status(device: Arc<DeviceInner>) {
    tokio::spawn(async move {
        if let Err(e) = device.load_status().await {
            tracing::warn!("{}: status reload failed: {}", device.identity.id, e);
        }
    });
}
