pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Callback registered on a bridge channel; receives `(channel, voltage_ratio)`
/// every time the device reports a new ratio.
pub type RatioSink = Box<dyn Fn(u32, f64) + Send + Sync>;

/// Multi-channel bridge input carrying the force transducers.
pub trait ForceBridge {
    /// Open one channel and block until it attaches or `attach_timeout` expires.
    /// `on_ratio` is owned by the channel for as long as it stays open.
    fn open_channel(
        &mut self,
        serial_number: u32,
        channel: u32,
        attach_timeout: Duration,
        on_ratio: RatioSink,
    ) -> Result<Box<dyn BridgeChannel + Send>, Box<dyn std::error::Error + Send + Sync>>;
}

/// An attached bridge channel. Closing stops further `RatioSink` calls.
pub trait BridgeChannel {
    fn channel(&self) -> u32;
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Angular-rate sensor. `read` blocks until the next packet arrives.
pub trait Gyro {
    /// Rates for (x, y, z) in degrees per second.
    fn read(&mut self) -> Result<[f64; 3], Box<dyn std::error::Error + Send + Sync>>;

    /// Drop anything buffered before this call.
    fn discard_pending(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn read_z(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.read()?[2])
    }
}

/// Step/direction driver of the release mechanism.
pub trait Stepper {
    fn set_direction(&mut self, forward: bool)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The three electromagnet hold-points, switched together.
pub trait HoldMagnets {
    fn set_engaged(&mut self, engaged: bool)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: ForceBridge + ?Sized> ForceBridge for Box<T> {
    fn open_channel(
        &mut self,
        serial_number: u32,
        channel: u32,
        attach_timeout: Duration,
        on_ratio: RatioSink,
    ) -> Result<Box<dyn BridgeChannel + Send>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).open_channel(serial_number, channel, attach_timeout, on_ratio)
    }
}

impl<T: Gyro + ?Sized> Gyro for Box<T> {
    fn read(&mut self) -> Result<[f64; 3], Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }

    fn discard_pending(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).discard_pending()
    }
}

impl<T: Stepper + ?Sized> Stepper for Box<T> {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_direction(forward)
    }

    fn set_step(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_step(high)
    }
}

impl<T: HoldMagnets + ?Sized> HoldMagnets for Box<T> {
    fn set_engaged(
        &mut self,
        engaged: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_engaged(engaged)
    }
}

/// Builds device handles on demand. Each measurement asks for fresh handles
/// and drops them when it finishes, so nothing stays open between stages.
pub trait RigFactory: Send + Sync {
    fn bridge(&self) -> Result<Box<dyn ForceBridge + Send>, Box<dyn std::error::Error + Send + Sync>>;
    fn gyro(&self) -> Result<Box<dyn Gyro + Send>, Box<dyn std::error::Error + Send + Sync>>;
    fn stepper(&self) -> Result<Box<dyn Stepper + Send>, Box<dyn std::error::Error + Send + Sync>>;
    fn magnets(&self)
    -> Result<Box<dyn HoldMagnets + Send>, Box<dyn std::error::Error + Send + Sync>>;
}
