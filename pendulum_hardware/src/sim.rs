//! Simulated rig: force bridge, gyro, stepper and hold magnets sharing one
//! physical model.
//!
//! Releasing the magnets starts a decaying oscillation that the gyro reports;
//! the bridge reports the load of whatever currently sits on the plate. All
//! timing goes through the supplied `Clock`, so a `ManualClock` makes whole
//! experiments run instantly.
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pendulum_traits::{
    BridgeChannel, Clock, ForceBridge, Gyro, HoldMagnets, RatioSink, RigFactory, Stepper,
};
use tracing::{debug, trace};

use crate::error::HwError;

/// Physical parameters of the simulated rig.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub plate_kg: f64,
    pub object_kg: f64,
    /// Oscillation period after release (s)
    pub period_s: f64,
    /// Exponential decay time constant of the oscillation envelope (s)
    pub tau_s: f64,
    /// Angular-rate amplitude at the release instant (deg/s)
    pub amplitude_dps: f64,
    /// Uniform noise half-width added to every gyro read (deg/s)
    pub noise_dps: f64,
    /// Constant gyro bias; the acquisition loop should zero it out (deg/s)
    pub gyro_bias_dps: f64,
    /// Bridge calibration the simulated cells are built against
    pub gain: f64,
    pub offset: f64,
    /// Number of cells sharing the load
    pub channels: u32,
    /// Channels that fail to attach
    pub failed_channels: Vec<u32>,
    /// Channels that attach but never report a ratio
    pub silent_channels: Vec<u32>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            plate_kg: 4.2,
            object_kg: 1.0,
            period_s: 3.0,
            tau_s: 2.0,
            amplitude_dps: 40.0,
            noise_dps: 0.0,
            gyro_bias_dps: 0.35,
            gain: 3.3508e4,
            offset: -1.5682e-5,
            channels: 3,
            failed_channels: Vec::new(),
            silent_channels: Vec::new(),
        }
    }
}

struct OpenSink {
    id: u64,
    channel: u32,
    sink: Arc<RatioSink>,
}

struct SimState {
    params: SimParams,
    object_on_plate: AtomicBool,
    released_at: Mutex<Option<Instant>>,
    sinks: Mutex<Vec<OpenSink>>,
    next_sink_id: AtomicU64,
    noise_state: AtomicU64,
    open_handles: AtomicUsize,
    rising_edges: AtomicUsize,
    releases: AtomicUsize,
}

impl SimState {
    fn load_kg(&self) -> f64 {
        if self.object_on_plate.load(Ordering::Relaxed) {
            self.params.plate_kg + self.params.object_kg
        } else {
            self.params.plate_kg
        }
    }

    /// Ratio one cell reports when it carries its share of the load.
    fn ratio(&self) -> f64 {
        let share = self.load_kg() / f64::from(self.params.channels.max(1));
        self.params.offset + share / self.params.gain
    }

    fn broadcast(&self) {
        let ratio = self.ratio();
        if let Ok(sinks) = self.sinks.lock() {
            for s in sinks.iter() {
                (s.sink)(s.channel, ratio);
            }
        }
    }

    /// xorshift64*, mapped to [-1, 1).
    fn next_noise(&self) -> f64 {
        let mut x = self.noise_state.load(Ordering::Relaxed);
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.noise_state.store(x, Ordering::Relaxed);
        let r = x.wrapping_mul(0x2545_F491_4F6C_DD1D);
        (r >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}

/// Handle to the shared simulated rig; hands out device handles.
#[derive(Clone)]
pub struct SimRig<C: Clock + Clone> {
    state: Arc<SimState>,
    clock: C,
}

impl<C: Clock + Clone> SimRig<C> {
    pub fn new(params: SimParams, clock: C) -> Self {
        Self {
            state: Arc::new(SimState {
                params,
                object_on_plate: AtomicBool::new(false),
                released_at: Mutex::new(None),
                sinks: Mutex::new(Vec::new()),
                next_sink_id: AtomicU64::new(1),
                noise_state: AtomicU64::new(0x9E37_79B9_7F4A_7C15),
                open_handles: AtomicUsize::new(0),
                rising_edges: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }),
            clock,
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.state.params
    }

    /// Put the test object on the plate; open channels see the new load.
    pub fn place_object(&self) {
        self.state.object_on_plate.store(true, Ordering::Relaxed);
        self.state.broadcast();
    }

    pub fn remove_object(&self) {
        self.state.object_on_plate.store(false, Ordering::Relaxed);
        self.state.broadcast();
    }

    pub fn bridge(&self) -> SimulatedBridge {
        SimulatedBridge {
            state: self.state.clone(),
        }
    }

    pub fn gyro(&self) -> SimulatedGyro<C> {
        SimulatedGyro {
            state: self.state.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn stepper(&self) -> SimulatedStepper {
        SimulatedStepper {
            state: self.state.clone(),
            forward: false,
            high: false,
        }
    }

    pub fn magnets(&self) -> SimulatedMagnets<C> {
        SimulatedMagnets {
            state: self.state.clone(),
            clock: self.clock.clone(),
            engaged: false,
        }
    }

    /// Step pulses issued so far (rising edges on the step line).
    pub fn step_pulses(&self) -> usize {
        self.state.rising_edges.load(Ordering::Relaxed)
    }

    /// How many times the hold magnets went from engaged to released.
    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::Relaxed)
    }

    /// Number of bridge channels currently open.
    pub fn open_channels(&self) -> usize {
        self.state.open_handles.load(Ordering::Relaxed)
    }
}

impl<C> RigFactory for SimRig<C>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    fn bridge(&self) -> Result<Box<dyn ForceBridge + Send>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Box::new(SimRig::bridge(self)))
    }

    fn gyro(&self) -> Result<Box<dyn Gyro + Send>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Box::new(SimRig::gyro(self)))
    }

    fn stepper(&self) -> Result<Box<dyn Stepper + Send>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Box::new(SimRig::stepper(self)))
    }

    fn magnets(
        &self,
    ) -> Result<Box<dyn HoldMagnets + Send>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Box::new(SimRig::magnets(self)))
    }
}

/// Simulated multi-channel bridge; channels report immediately on attach
/// and again whenever the plate load changes.
pub struct SimulatedBridge {
    state: Arc<SimState>,
}

impl ForceBridge for SimulatedBridge {
    fn open_channel(
        &mut self,
        serial_number: u32,
        channel: u32,
        _attach_timeout: Duration,
        on_ratio: RatioSink,
    ) -> Result<Box<dyn BridgeChannel + Send>, Box<dyn std::error::Error + Send + Sync>> {
        let p = &self.state.params;
        if channel >= p.channels || p.failed_channels.contains(&channel) {
            return Err(Box::new(HwError::NotAttached { channel }));
        }
        debug!(serial_number, channel, "sim bridge channel attached");
        let id = self.state.next_sink_id.fetch_add(1, Ordering::Relaxed);
        self.state.open_handles.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::new(on_ratio);
        if !p.silent_channels.contains(&channel) {
            sink(channel, self.state.ratio());
            if let Ok(mut sinks) = self.state.sinks.lock() {
                sinks.push(OpenSink { id, channel, sink });
            }
        }
        Ok(Box::new(SimulatedChannel {
            state: self.state.clone(),
            id,
            channel,
            open: true,
        }))
    }
}

pub struct SimulatedChannel {
    state: Arc<SimState>,
    id: u64,
    channel: u32,
    open: bool,
}

impl BridgeChannel for SimulatedChannel {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.open {
            return Err(Box::new(HwError::Closed {
                channel: self.channel,
            }));
        }
        self.open = false;
        self.state.open_handles.fetch_sub(1, Ordering::Relaxed);
        if let Ok(mut sinks) = self.state.sinks.lock() {
            sinks.retain(|s| s.id != self.id);
        }
        debug!(channel = self.channel, "sim bridge channel closed");
        Ok(())
    }
}

pub struct SimulatedGyro<C: Clock> {
    state: Arc<SimState>,
    clock: C,
}

impl<C: Clock> Gyro for SimulatedGyro<C> {
    fn read(&mut self) -> Result<[f64; 3], Box<dyn std::error::Error + Send + Sync>> {
        let p = &self.state.params;
        let released = self.state.released_at.lock().map(|r| *r).unwrap_or(None);
        let motion = match released {
            Some(at) => {
                let t = self.clock.now().saturating_duration_since(at).as_secs_f64();
                let omega = std::f64::consts::TAU / p.period_s;
                p.amplitude_dps * (-t / p.tau_s).exp() * (omega * t).sin()
            }
            None => 0.0,
        };
        let z = p.gyro_bias_dps + motion + p.noise_dps * self.state.next_noise();
        trace!(z, "sim gyro read");
        Ok([0.0, 0.0, z])
    }

    fn discard_pending(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

pub struct SimulatedStepper {
    state: Arc<SimState>,
    forward: bool,
    high: bool,
}

impl SimulatedStepper {
    pub fn is_forward(&self) -> bool {
        self.forward
    }
}

impl Stepper for SimulatedStepper {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.forward = forward;
        Ok(())
    }

    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if high && !self.high {
            self.state.rising_edges.fetch_add(1, Ordering::Relaxed);
        }
        self.high = high;
        Ok(())
    }
}

pub struct SimulatedMagnets<C: Clock> {
    state: Arc<SimState>,
    clock: C,
    engaged: bool,
}

impl<C: Clock> HoldMagnets for SimulatedMagnets<C> {
    fn set_engaged(
        &mut self,
        engaged: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.engaged && !engaged {
            if let Ok(mut r) = self.state.released_at.lock() {
                *r = Some(self.clock.now());
            }
            self.state.releases.fetch_add(1, Ordering::Relaxed);
            debug!("sim magnets released");
        }
        self.engaged = engaged;
        Ok(())
    }
}
