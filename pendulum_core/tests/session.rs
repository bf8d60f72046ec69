use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use pendulum_config::Config;
use pendulum_core::{Components, RigError, Session, Stage, Step};
use pendulum_hardware::{SimParams, SimRig};
use pendulum_traits::{
    ForceBridge, Gyro, HoldMagnets, ManualClock, MonotonicClock, RigFactory, Stepper,
};

type BoxErr = Box<dyn std::error::Error + Send + Sync>;

fn session_over(factory: Arc<dyn RigFactory>, clock: ManualClock) -> Session<ManualClock> {
    let components = Components::from_config(&Config::default(), None, clock).unwrap();
    Session::new(components, factory)
}

/// Sim rig whose bridge can be blocked on a gate or made to fail.
struct Harness {
    rig: SimRig<ManualClock>,
    gate: Option<xch::Receiver<()>>,
    bridge_fails: AtomicBool,
}

impl Harness {
    fn new(rig: SimRig<ManualClock>) -> Self {
        Self {
            rig,
            gate: None,
            bridge_fails: AtomicBool::new(false),
        }
    }

    fn gated(rig: SimRig<ManualClock>) -> (Self, xch::Sender<()>) {
        let (tx, rx) = xch::bounded(1);
        (
            Self {
                gate: Some(rx),
                ..Self::new(rig)
            },
            tx,
        )
    }
}

impl RigFactory for Harness {
    fn bridge(&self) -> Result<Box<dyn ForceBridge + Send>, BoxErr> {
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| "gate closed")?;
        }
        if self.bridge_fails.load(Ordering::SeqCst) {
            return Err("bridge unplugged".into());
        }
        RigFactory::bridge(&self.rig)
    }

    fn gyro(&self) -> Result<Box<dyn Gyro + Send>, BoxErr> {
        RigFactory::gyro(&self.rig)
    }

    fn stepper(&self) -> Result<Box<dyn Stepper + Send>, BoxErr> {
        RigFactory::stepper(&self.rig)
    }

    fn magnets(&self) -> Result<Box<dyn HoldMagnets + Send>, BoxErr> {
        RigFactory::magnets(&self.rig)
    }
}

#[test]
fn full_experiment_on_the_simulated_rig() {
    let clock = ManualClock::new();
    let rig = SimRig::new(SimParams::default(), clock.clone());
    let mut session = session_over(Arc::new(rig.clone()), clock);

    assert_eq!(session.run(Step::MeasurePlate).unwrap(), Stage::AwaitingObject);
    let plate = session.experiment().baseline().copied().unwrap();
    assert!((plate.kg - 4.2).abs() < 1e-6, "plate {}", plate.kg);
    assert_eq!(rig.open_channels(), 0);

    rig.place_object();
    assert_eq!(session.run(Step::MeasureObject).unwrap(), Stage::AwaitingOscillation);
    let object = session.experiment().object().copied().unwrap();
    assert!((object.kg - 1.0).abs() < 1e-6, "object {}", object.kg);
    assert_eq!(object.baseline_kg, Some(plate.kg));

    assert_eq!(session.run(Step::Acquire).unwrap(), Stage::AwaitingResults);
    assert_eq!(rig.releases(), 1);

    let r = session.analyze().unwrap().clone();
    assert_eq!(session.stage(), Stage::Done);

    let period = r.period_s.unwrap();
    assert!((period - 3.0).abs() < 0.02, "period {period}");
    let expected = 0.4572f64.powi(2) * 9.0 / (4.0 * PI * PI * 1.5);
    let moi = r.moment_of_inertia.unwrap();
    assert!((moi / expected - 1.0).abs() < 0.01, "moi {moi} vs {expected}");
    let settling = r.settling_time_s.unwrap();
    assert!((settling - 8.0).abs() < 1.0, "settling {settling}");
}

#[test]
fn second_start_while_running_is_busy() {
    let clock = ManualClock::new();
    let (harness, gate) = Harness::gated(SimRig::new(SimParams::default(), clock.clone()));
    let mut session = session_over(Arc::new(harness), clock);

    session.start(Step::MeasurePlate).unwrap();
    assert!(session.is_busy());
    assert!(session.poll().is_none());
    assert_eq!(session.start(Step::MeasurePlate), Err(RigError::Busy));
    assert_eq!(session.analyze().err(), Some(RigError::Busy));

    gate.send(()).unwrap();
    assert_eq!(session.wait().unwrap(), Stage::AwaitingObject);
    assert!(!session.is_busy());
}

#[test]
fn poll_delivers_the_result_once() {
    let clock = ManualClock::new();
    let (harness, gate) = Harness::gated(SimRig::new(SimParams::default(), clock.clone()));
    let mut session = session_over(Arc::new(harness), clock);

    session.start(Step::MeasurePlate).unwrap();
    gate.send(()).unwrap();
    let stage = loop {
        if let Some(r) = session.poll() {
            break r.unwrap();
        }
        std::thread::sleep(Duration::from_millis(1));
    };
    assert_eq!(stage, Stage::AwaitingObject);
    assert!(session.poll().is_none());
}

#[test]
fn failed_object_measurement_keeps_the_baseline() {
    let clock = ManualClock::new();
    let rig = SimRig::new(SimParams::default(), clock.clone());
    let harness = Arc::new(Harness::new(rig.clone()));
    let mut session = session_over(harness.clone(), clock);

    session.run(Step::MeasurePlate).unwrap();
    rig.place_object();
    harness.bridge_fails.store(true, Ordering::SeqCst);

    let err = session.run(Step::MeasureObject).unwrap_err();
    assert!(matches!(&err, RigError::Hardware(m) if m.contains("unplugged")), "{err}");
    assert_eq!(session.stage(), Stage::AwaitingObject);
    assert!((session.experiment().baseline().unwrap().kg - 4.2).abs() < 1e-6);
    assert!(session.experiment().object().is_none());

    harness.bridge_fails.store(false, Ordering::SeqCst);
    assert_eq!(session.run(Step::MeasureObject).unwrap(), Stage::AwaitingOscillation);
}

#[test]
fn cancelled_measurement_reports_cancelled() {
    let clock = ManualClock::new();
    let (harness, gate) = Harness::gated(SimRig::new(SimParams::default(), clock.clone()));
    let mut session = session_over(Arc::new(harness), clock);

    session.start(Step::MeasurePlate).unwrap();
    session.cancel();
    gate.send(()).unwrap();
    assert_eq!(session.wait(), Err(RigError::Cancelled));
    assert_eq!(session.stage(), Stage::AwaitingPlate);
    assert!(session.experiment().baseline().is_none());
}

#[test]
fn reset_discards_the_outstanding_worker() {
    let clock = ManualClock::new();
    let (harness, gate) = Harness::gated(SimRig::new(SimParams::default(), clock.clone()));
    let mut session = session_over(Arc::new(harness), clock);

    run_after_gate(&mut session, &gate, Step::MeasurePlate);
    session.start(Step::MeasureObject).unwrap();
    gate.send(()).unwrap();
    session.reset();

    assert!(!session.is_busy());
    assert_eq!(session.stage(), Stage::AwaitingPlate);
    assert!(session.experiment().baseline().is_none());
    assert!(session.experiment().object().is_none());
    assert!(session.poll().is_none());
}

#[test]
fn steps_out_of_order_are_refused() {
    let clock = ManualClock::new();
    let rig = SimRig::new(SimParams::default(), clock.clone());
    let mut session = session_over(Arc::new(rig), clock);

    assert!(matches!(session.start(Step::Acquire), Err(RigError::Sequence(_))));
    assert!(matches!(session.analyze(), Err(RigError::Sequence(_))));
    assert!(!session.is_busy());
    assert_eq!(session.stage(), Stage::AwaitingPlate);
}

fn run_after_gate(session: &mut Session<ManualClock>, gate: &xch::Sender<()>, step: Step) {
    session.start(step).unwrap();
    gate.send(()).unwrap();
    session.wait().unwrap();
}

#[test]
fn reset_interrupts_a_settling_measurement() {
    let rig = SimRig::new(SimParams::default(), MonotonicClock::new());
    let components =
        Components::from_config(&Config::default(), None, MonotonicClock::new()).unwrap();
    let mut session = Session::new(components, Arc::new(rig.clone()));

    session.start(Step::MeasurePlate).unwrap();
    // Default settle is 2 s; the worker is asleep in it.
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    session.reset();
    let blocked = started.elapsed();

    assert!(blocked < Duration::from_millis(250), "reset blocked for {blocked:?}");
    assert!(!session.is_busy());
    assert_eq!(session.stage(), Stage::AwaitingPlate);
    assert_eq!(rig.open_channels(), 0);
}
