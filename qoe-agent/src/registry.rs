//! Process-wide directory of tracked players.
//!
//! The registry owns what players share: the environment and viewer bags,
//! the sliding viewing session and the runtime that carries beacon traffic.
//! Each player gets its own state machine and delivery engine; trackable
//! events leaving a player are stamped with the shared bags on their way to
//! the engine (or to a client observer, when one is installed).

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};
use playback_model::{
    AttributeBag, DataEvent, EntityKind, Event, Orientation, TrackableEvent, keys,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{AgentConfig, PlayerOptions};
use crate::delivery::{DeliveryEngine, DeliveryOptions, DeliveryStats, JitterSource, RandomJitter};
use crate::host::DeviceDescriptor;
use crate::player::{PlayerListener, PlayerStateMachine};
use crate::session::SessionWindow;
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};

pub const API_VERSION: &str = "1.0";
pub const EMBED_VERSION: &str = "1.0.0";
pub const EMBED_NAME: &str = "core-sdk";

/// Receives trackable events in place of the delivery engine.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, player: &str, event: &TrackableEvent);
}

struct SharedMeta {
    environment: AttributeBag,
    viewer: AttributeBag,
    session: SessionWindow,
    bootstrapped: bool,
    observer: Option<Arc<dyn EventObserver>>,
}

struct PlayerEntry {
    machine: Arc<Mutex<PlayerStateMachine>>,
    delivery: DeliveryEngine,
}

/// Builder for [`Registry`]. Anything not supplied falls back to the
/// production implementation.
pub struct RegistryBuilder {
    config: AgentConfig,
    device: DeviceDescriptor,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    jitter: Option<Arc<dyn JitterSource>>,
    runtime: Option<Handle>,
}

impl RegistryBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            device: DeviceDescriptor::default(),
            transport: None,
            clock: None,
            jitter: None,
            runtime: None,
        }
    }

    pub fn device(mut self, device: DeviceDescriptor) -> Self {
        self.device = device;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Runtime beacon requests and timers are spawned on. Defaults to the
    /// runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Arc<Registry>> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|_| Error::config("a tokio runtime is required to deliver beacons"))?,
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config.transport)?),
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let jitter = self
            .jitter
            .unwrap_or_else(|| Arc::new(RandomJitter) as Arc<dyn JitterSource>);

        let shared = SharedMeta {
            environment: AttributeBag::new(EntityKind::Environment),
            viewer: AttributeBag::new(EntityKind::Viewer),
            session: SessionWindow::new(self.config.timing.session_timeout_ms),
            bootstrapped: false,
            observer: None,
        };
        Ok(Arc::new(Registry {
            config: self.config,
            device: self.device,
            transport,
            clock,
            jitter,
            runtime,
            players: DashMap::new(),
            shared: Arc::new(RwLock::new(shared)),
        }))
    }
}

pub struct Registry {
    config: AgentConfig,
    device: DeviceDescriptor,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    runtime: Handle,
    players: DashMap<String, PlayerEntry>,
    shared: Arc<RwLock<SharedMeta>>,
}

impl Registry {
    pub fn builder(config: AgentConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    // ========== Players ==========

    /// Registers a player under `tag` and starts its delivery engine.
    pub fn create_player(&self, tag: &str, options: &PlayerOptions) -> Result<()> {
        let slot = match self.players.entry(tag.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::config(format!("player '{tag}' is already registered")));
            }
            Entry::Vacant(slot) => slot,
        };
        self.bootstrap();

        let beacon = options.beacon(&self.config.beacon);
        let domain = beacon.resolved_domain();
        let delivery = DeliveryEngine::new(DeliveryOptions {
            config: self.config.delivery.clone(),
            domain: domain.clone(),
            long_dispatch: beacon.long_dispatch,
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            jitter: Arc::clone(&self.jitter),
            runtime: self.runtime.clone(),
        });
        delivery.start();

        let mut machine =
            PlayerStateMachine::new(tag, Arc::clone(&self.clock), self.config.timing.clone());
        machine.add_listener(Box::new(DeliveryForwarder {
            tag: tag.to_string(),
            delivery: delivery.clone(),
            shared: Arc::clone(&self.shared),
        }));

        slot.insert(PlayerEntry {
            machine: Arc::new(Mutex::new(machine)),
            delivery,
        });
        info!(player = %tag, domain = %domain, long_dispatch = beacon.long_dispatch, "Player registered");
        Ok(())
    }

    /// Releases a player: its view is torn down and its queue flushed.
    pub fn destroy_player(&self, tag: &str) -> Result<()> {
        let (_, entry) = self
            .players
            .remove(tag)
            .ok_or_else(|| Error::not_found("player", tag))?;
        entry.machine.lock().release();
        info!(player = %tag, "Player released");
        Ok(())
    }

    pub fn player_tags(&self) -> Vec<String> {
        self.players.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.players.contains_key(tag)
    }

    /// Runs `f` against a player's state machine.
    pub fn with_player<R>(&self, tag: &str, f: impl FnOnce(&PlayerStateMachine) -> R) -> Result<R> {
        let machine = self.machine(tag)?;
        let guard = machine.lock();
        Ok(f(&guard))
    }

    // ========== Dispatch ==========

    /// Hands an event to a player, extending the viewing session first.
    pub fn dispatch(&self, tag: &str, event: Event) -> Result<()> {
        let machine = self.machine(tag)?;
        self.touch_session();
        machine.lock().dispatch(event);
        Ok(())
    }

    /// Dispatches a data event. Environment and viewer fields are shared by
    /// every player and are kept here rather than in the player's view.
    pub fn dispatch_data(&self, tag: &str, data: DataEvent) -> Result<()> {
        if !data.environment.is_empty() || !data.viewer.is_empty() {
            let mut shared = self.shared.write();
            shared.environment.update(&data.environment);
            shared.viewer.update(&data.viewer);
        }
        self.dispatch(tag, Event::Data(data))
    }

    pub fn orientation_change(&self, tag: &str, orientation: Orientation) -> Result<()> {
        let machine = self.machine(tag)?;
        self.touch_session();
        machine.lock().dispatch_orientation_change(orientation)
    }

    pub fn flush(&self, tag: &str) -> Result<()> {
        self.machine(tag)?.lock().flush();
        Ok(())
    }

    pub fn set_verbose(&self, tag: &str, verbose: bool) -> Result<()> {
        self.entry_delivery(tag)?.set_verbose(verbose);
        Ok(())
    }

    pub fn stats(&self, tag: &str) -> Result<DeliveryStats> {
        Ok(self.entry_delivery(tag)?.stats())
    }

    /// Routes every trackable event to `observer` instead of the collector.
    /// `None` restores delivery.
    pub fn set_event_observer(&self, observer: Option<Arc<dyn EventObserver>>) {
        self.shared.write().observer = observer;
    }

    // ========== Shared metadata ==========

    pub fn session_id(&self) -> Option<String> {
        self.shared.read().session.id().map(str::to_string)
    }

    pub fn environment(&self) -> AttributeBag {
        self.shared.read().environment.clone()
    }

    pub fn viewer(&self) -> AttributeBag {
        self.shared.read().viewer.clone()
    }

    /// Releases every player.
    pub fn shutdown(&self) {
        for tag in self.player_tags() {
            if let Err(e) = self.destroy_player(&tag) {
                debug!(player = %tag, error = %e, "Player already released");
            }
        }
    }

    fn machine(&self, tag: &str) -> Result<Arc<Mutex<PlayerStateMachine>>> {
        self.players
            .get(tag)
            .map(|entry| Arc::clone(&entry.machine))
            .ok_or_else(|| Error::not_found("player", tag))
    }

    fn entry_delivery(&self, tag: &str) -> Result<DeliveryEngine> {
        self.players
            .get(tag)
            .map(|entry| entry.delivery.clone())
            .ok_or_else(|| Error::not_found("player", tag))
    }

    fn touch_session(&self) {
        let now = self.clock.now_ms();
        let mut guard = self.shared.write();
        let shared = &mut *guard;
        shared.session.touch(now);
        shared.session.write_to(&mut shared.environment);
    }

    fn bootstrap(&self) {
        let mut shared = self.shared.write();
        if shared.bootstrapped {
            return;
        }
        shared.bootstrapped = true;
        shared.environment.insert_scalar(keys::API_VERSION, API_VERSION);
        shared.environment.insert_scalar(keys::EMBED_VERSION, EMBED_VERSION);
        shared.environment.insert_scalar(keys::EMBED, EMBED_NAME);
        if let Some(device_id) = self.device.device_id.as_deref() {
            shared.environment.insert_scalar(keys::DEVICE_ID, device_id);
        }
        shared.viewer.update(&self.device.viewer_bag());
        debug!(device = ?self.device.device_id, "Environment initialized");
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Player listener that stamps the shared bags and hands trackable events
/// to the delivery engine or the installed observer.
struct DeliveryForwarder {
    tag: String,
    delivery: DeliveryEngine,
    shared: Arc<RwLock<SharedMeta>>,
}

impl PlayerListener for DeliveryForwarder {
    fn on_event(&mut self, event: &Event) -> Result<()> {
        let trackable = match event {
            Event::Trackable(trackable) => trackable,
            Event::Error(error) => {
                warn!(player = %self.tag, code = error.code, message = %error.message, "Player reported an error");
                return Ok(());
            }
            _ => return Ok(()),
        };

        let mut outgoing = trackable.clone();
        let observer = {
            let shared = self.shared.read();
            outgoing.stamp(&shared.environment);
            outgoing.stamp(&shared.viewer);
            shared.observer.clone()
        };
        match observer {
            Some(observer) => observer.on_event(&self.tag, &outgoing),
            None => self.delivery.enqueue(outgoing),
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.delivery.flush();
    }

    fn release(&mut self) {
        self.delivery.release();
    }
}
