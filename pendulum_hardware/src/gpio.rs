//! GPIO-backed release mechanism (Raspberry Pi, `rppal`).
//!
//! All outputs are driven low on construction, which is the rig's safe
//! state: magnets off, step idle, direction reverse.
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info};

use crate::error::{HwError, Result};

fn output(gpio: &Gpio, pin: u8) -> Result<OutputPin> {
    let mut out = gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))?
        .into_output();
    out.set_low();
    Ok(out)
}

pub struct GpioStepper {
    step: OutputPin,
    dir: OutputPin,
}

impl GpioStepper {
    pub fn new(step_pin: u8, dir_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let step = output(&gpio, step_pin)?;
        let dir = output(&gpio, dir_pin)?;
        info!(step_pin, dir_pin, "stepper outputs ready");
        Ok(Self { step, dir })
    }
}

impl pendulum_traits::Stepper for GpioStepper {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if forward {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        Ok(())
    }

    fn set_step(
        &mut self,
        high: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if high {
            self.step.set_high();
        } else {
            self.step.set_low();
        }
        Ok(())
    }
}

pub struct GpioMagnets {
    pins: Vec<OutputPin>,
}

impl GpioMagnets {
    pub fn new(magnet_pins: &[u8]) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pins = magnet_pins
            .iter()
            .map(|&p| output(&gpio, p))
            .collect::<Result<Vec<_>>>()?;
        info!(pins = ?magnet_pins, "hold magnet outputs ready");
        Ok(Self { pins })
    }
}

impl pendulum_traits::HoldMagnets for GpioMagnets {
    fn set_engaged(
        &mut self,
        engaged: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for pin in &mut self.pins {
            if engaged {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        debug!(engaged, "hold magnets switched");
        Ok(())
    }
}

impl Drop for GpioMagnets {
    fn drop(&mut self) {
        for pin in &mut self.pins {
            pin.set_low();
        }
    }
}
