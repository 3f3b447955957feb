use crate::client::{DeviceClient, LightDevice};
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::snapshot::LightSnapshot;
use crate::subscription::{ObserverRegistry, StateReceiver, SubscriptionId};
use crate::types::{Brightness, ColorTemperature, LightState, Power};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Continuously adjustable parameters whose commands are debounced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Brightness,
    ColorTemperature,
}

impl Parameter {
    fn index(self) -> usize {
        match self {
            Parameter::Brightness => 0,
            Parameter::ColorTemperature => 1,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Brightness => f.write_str("brightness"),
            Parameter::ColorTemperature => f.write_str("color temperature"),
        }
    }
}

/// Where a parameter's latest value is on its way to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPhase {
    /// Nothing waiting to be sent
    #[default]
    Idle,
    /// A value is scheduled; further changes restart the window
    Debouncing,
    /// The window elapsed and the network call is in flight
    Dispatching,
}

/// Latest value requested for a parameter, not yet sent
#[derive(Debug, Clone, Copy)]
enum PendingCommand {
    Brightness(Brightness),
    ColorTemperature(ColorTemperature),
}

impl PendingCommand {
    fn parameter(&self) -> Parameter {
        match self {
            PendingCommand::Brightness(_) => Parameter::Brightness,
            PendingCommand::ColorTemperature(_) => Parameter::ColorTemperature,
        }
    }

    async fn send<D: LightDevice>(self, device: &D) -> Result<()> {
        match self {
            PendingCommand::Brightness(value) => device.send_brightness(value).await,
            PendingCommand::ColorTemperature(value) => device.send_color_temperature(value).await,
        }
    }
}

/// Single-slot scheduler state for one parameter
#[derive(Default)]
struct Slot {
    phase: CommandPhase,
    /// Bumped on every schedule; stale timers and dispatches compare against it
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Device work that follows a state change
#[derive(Debug, Clone, Copy)]
enum Command {
    Power(Power),
    Debounced(PendingCommand),
}

/// One committed change waiting in the outbox
struct Committed {
    /// `None` when the write left the state as it was
    state: Option<LightState>,
    command: Option<Command>,
}

struct Inner<D> {
    device: Arc<D>,
    runtime: Handle,
    state: Mutex<LightState>,
    /// Committed changes not yet delivered, in write order
    outbox: Mutex<VecDeque<Committed>>,
    /// Held by the one thread draining the outbox
    delivering: Mutex<()>,
    observers: ObserverRegistry,
    slots: Mutex<[Slot; 2]>,
    /// Held for the duration of a network call; one in flight per parameter
    in_flight: [tokio::sync::Mutex<()>; 2],
    power_tx: mpsc::UnboundedSender<Power>,
    debounce: Duration,
}

impl<D: LightDevice> Inner<D> {
    /// The only write path for the light state.
    ///
    /// The write and its outbox entry happen under the state lock, so
    /// observers and the device see changes in the order they were made.
    /// Observers are only told about writes that changed the state;
    /// `command` is issued either way.
    fn commit(
        self: &Arc<Self>,
        update: impl FnOnce(LightState) -> LightState,
        command: impl FnOnce(&LightState) -> Option<Command>,
    ) -> LightState {
        let next = {
            let mut state = self.state.lock();
            let previous = *state;
            let next = update(previous);
            *state = next;

            let committed = Committed {
                state: (next != previous).then_some(next),
                command: command(&next),
            };
            if committed.state.is_some() || committed.command.is_some() {
                self.outbox.lock().push_back(committed);
            }
            next
        };

        self.deliver();
        next
    }

    /// Drain the outbox: notify observers, then hand the command on
    ///
    /// One thread delivers at a time. A commit that finds delivery in
    /// progress, including one made from inside a callback, leaves its
    /// entry to the delivering thread.
    fn deliver(self: &Arc<Self>) {
        loop {
            let Some(delivering) = self.delivering.try_lock() else {
                return;
            };

            loop {
                let next = self.outbox.lock().pop_front();
                let Some(committed) = next else {
                    break;
                };

                if let Some(state) = committed.state {
                    tracing::debug!("State: {}", state);
                    self.observers.notify(&state);
                }
                match committed.command {
                    Some(Command::Power(power)) => self.send_power(power),
                    Some(Command::Debounced(command)) => self.schedule(command),
                    None => {}
                }
            }

            drop(delivering);
            // An entry pushed after the last pop but before the unlock
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    fn send_power(&self, power: Power) {
        if self.power_tx.send(power).is_err() {
            tracing::warn!("Power worker stopped; dropping set_power {}", power);
        }
    }

    /// Replace the parameter's pending command, restarting its window
    fn schedule(self: &Arc<Self>, command: PendingCommand) {
        let parameter = command.parameter();
        let mut slots = self.slots.lock();
        let slot = &mut slots[parameter.index()];

        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        slot.generation += 1;
        slot.phase = CommandPhase::Debouncing;
        let timer = self.clone().run_timer(slot.generation, command);
        slot.timer = Some(self.runtime.spawn(timer));
    }

    /// Timer body: wait out the debounce window, then hand off to a
    /// separate dispatch task so later cancellation cannot touch it
    async fn run_timer(self: Arc<Self>, generation: u64, command: PendingCommand) {
        tokio::time::sleep(self.debounce).await;

        let parameter = command.parameter();
        {
            let mut slots = self.slots.lock();
            let slot = &mut slots[parameter.index()];
            if slot.generation != generation {
                return;
            }
            slot.phase = CommandPhase::Dispatching;
            slot.timer = None;
        }

        tokio::spawn(self.dispatch(generation, command));
    }

    async fn dispatch(self: Arc<Self>, generation: u64, command: PendingCommand) {
        let parameter = command.parameter();

        {
            let _in_flight = self.in_flight[parameter.index()].lock().await;
            tracing::debug!("Dispatching {:?}", command);

            if let Err(e) = command.send(&*self.device).await {
                tracing::warn!("Failed to set {}: {}", parameter, e);
            }
        }

        let mut slots = self.slots.lock();
        let slot = &mut slots[parameter.index()];
        if slot.generation == generation && slot.phase == CommandPhase::Dispatching {
            slot.phase = CommandPhase::Idle;
        }
    }
}

/// Keeps a local model of one light in sync with user input and the device
///
/// Intents update the local state immediately and notify observers before
/// anything touches the network. Power changes are sent right away, in order.
/// Brightness and color temperature are debounced: during a slider drag only
/// the last value is sent, once the input has been quiet for the debounce
/// window. Network failures are logged and dropped; the local state is not
/// rolled back, and [`refresh_device_state`](Self::refresh_device_state) is
/// the way to resynchronize.
///
/// The controller is cheap to clone; clones share the same state.
///
/// # Example
///
/// ```no_run
/// use ceiling_light::{DeviceConfig, LightController};
///
/// #[tokio::main]
/// async fn main() {
///     let controller = LightController::from_config(&DeviceConfig::new("192.168.31.123"));
///
///     controller.on_state_changed(|state| println!("now {}", state));
///
///     controller.turn_on();
///     for value in [10, 40, 70] {
///         controller.set_brightness(value); // only 70 reaches the device
///     }
///
///     let _ = controller.refresh_device_state().await;
/// }
/// ```
pub struct LightController<D: LightDevice = DeviceClient> {
    inner: Arc<Inner<D>>,
}

impl<D: LightDevice> Clone for LightController<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl LightController<DeviceClient> {
    /// Controller for the light described by `config`, using the current runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(DeviceClient::new(config), config.debounce)
    }
}

impl<D: LightDevice> LightController<D> {
    /// Create a controller whose background work runs on the current runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(device: D, debounce: Duration) -> Self {
        Self::with_runtime(device, debounce, Handle::current())
    }

    /// Create a controller whose background work runs on `runtime`
    ///
    /// Intents may then be called from threads outside the runtime.
    pub fn with_runtime(device: D, debounce: Duration, runtime: Handle) -> Self {
        let device = Arc::new(device);
        let (power_tx, power_rx) = mpsc::unbounded_channel();

        runtime.spawn(power_worker(device.clone(), power_rx));

        Self {
            inner: Arc::new(Inner {
                device,
                runtime,
                state: Mutex::new(LightState::default()),
                outbox: Mutex::new(VecDeque::new()),
                delivering: Mutex::new(()),
                observers: ObserverRegistry::new(),
                slots: Mutex::new(Default::default()),
                in_flight: [tokio::sync::Mutex::new(()), tokio::sync::Mutex::new(())],
                power_tx,
                debounce,
            }),
        }
    }

    // ========== State ==========

    /// Current light state
    pub fn state(&self) -> LightState {
        *self.inner.state.lock()
    }

    pub fn power(&self) -> Power {
        self.state().power
    }

    pub fn is_on(&self) -> bool {
        self.power().is_on()
    }

    pub fn brightness(&self) -> Brightness {
        self.state().brightness
    }

    pub fn color_temperature(&self) -> ColorTemperature {
        self.state().color_temperature
    }

    /// Where the latest value of `parameter` is on its way to the device
    pub fn phase(&self, parameter: Parameter) -> CommandPhase {
        self.inner.slots.lock()[parameter.index()].phase
    }

    /// Snapshot of the current state for external readers
    pub fn export_snapshot(&self) -> LightSnapshot {
        LightSnapshot::from(self.state())
    }

    // ========== Observers ==========

    /// Subscribe to state changes through a channel
    ///
    /// Multiple subscriptions can be active simultaneously.
    pub fn subscribe(&self) -> StateReceiver {
        self.inner.observers.subscribe()
    }

    /// Call `callback` with the full state on every change
    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LightState) + Send + Sync + 'static,
    {
        self.inner.observers.on_state_changed(callback)
    }

    /// Call `callback` on every change for as long as `observer` is alive
    ///
    /// Only a weak reference to `observer` is kept.
    pub fn observe<T, F>(&self, observer: &Arc<T>, callback: F) -> SubscriptionId
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &LightState) + Send + Sync + 'static,
    {
        self.inner.observers.observe(observer, callback)
    }

    /// Remove a callback; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    // ========== Power ==========

    pub fn turn_on(&self) {
        self.set_power(Power::On);
    }

    pub fn turn_off(&self) {
        self.set_power(Power::Off);
    }

    /// Invert the current power state
    pub fn toggle_power(&self) {
        self.inner.commit(
            |state| state.with_power(state.power.toggled()),
            |state| Some(Command::Power(state.power)),
        );
    }

    fn set_power(&self, power: Power) {
        self.inner.commit(|state| state.with_power(power), |_| Some(Command::Power(power)));
    }

    // ========== Debounced parameters ==========

    /// Set brightness, clamped into 1-100
    pub fn set_brightness(&self, value: i64) {
        let brightness = Brightness::clamped(value);
        let command = Command::Debounced(PendingCommand::Brightness(brightness));
        self.inner.commit(|state| state.with_brightness(brightness), |_| Some(command));
    }

    /// Set color temperature, clamped into 1700-6500 K
    pub fn set_color_temperature(&self, value: i64) {
        let color_temperature = ColorTemperature::clamped(value);
        let command = Command::Debounced(PendingCommand::ColorTemperature(color_temperature));
        self.inner.commit(
            |state| state.with_color_temperature(color_temperature),
            |_| Some(command),
        );
    }

    // ========== Refresh ==========

    /// Read the device's state and make it the local state
    ///
    /// Runs in the background; the returned handle can be awaited or dropped.
    /// On failure the local state is left untouched. A refresh that completes
    /// after newer local changes overwrites them with what the device reported.
    pub fn refresh_device_state(&self) -> JoinHandle<Result<LightState>> {
        let inner = self.inner.clone();

        self.inner.runtime.spawn(async move {
            match inner.device.query_properties().await {
                Ok(props) => {
                    let reported =
                        LightState::new(props.power, props.brightness, props.color_temperature);
                    let state = inner.commit(|_| reported, |_| None);
                    tracing::info!("Refreshed device state: {}", state);
                    Ok(state)
                }
                Err(e) => {
                    tracing::warn!("Failed to refresh device state: {}", e);
                    Err(e)
                }
            }
        })
    }
}

/// Sends power commands one at a time, in the order they were issued
async fn power_worker<D: LightDevice>(device: Arc<D>, mut rx: mpsc::UnboundedReceiver<Power>) {
    while let Some(power) = rx.recv().await {
        tracing::debug!("Dispatching power {}", power);
        if let Err(e) = device.send_power(power).await {
            tracing::warn!("Failed to set power {}: {}", power, e);
        }
    }
}
