//! Mapping from smoothed bearing to a single-axis actuator command, and the
//! sinks that commands are issued to.

use serde::Serialize;

use crate::config::{ActuatorConfig, TrackerConfig};
use crate::error::Result;

/// A position command, always inside the actuator's mechanical range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorCommand {
    pub angle_deg: f32,
    pub pulse_width_us: f32,
}

impl ActuatorCommand {
    /// Pulse width rounded to whole microseconds
    pub fn pulse_us(&self) -> u32 {
        self.pulse_width_us.round() as u32
    }

    /// Angle rounded to a whole-degree servo step
    ///
    /// Signed, since a mechanical range may extend below 0°.
    pub fn angle_step(&self) -> i32 {
        self.angle_deg.round() as i32
    }
}

/// Linear bearing → angle → pulse mapping
#[derive(Debug, Clone)]
pub struct ActuatorMapping {
    center_offset_deg: f32,
    min_angle_deg: f32,
    max_angle_deg: f32,
    min_pulse_us: f32,
    max_pulse_us: f32,
}

impl ActuatorMapping {
    pub fn new(tracker: &TrackerConfig, actuator: &ActuatorConfig) -> Self {
        Self {
            center_offset_deg: tracker.center_offset_deg,
            min_angle_deg: actuator.min_angle_deg,
            max_angle_deg: actuator.max_angle_deg,
            min_pulse_us: actuator.min_pulse_us,
            max_pulse_us: actuator.max_pulse_us,
        }
    }

    /// Command for a bearing relative to broadside
    ///
    /// Non-finite bearings map to the center position.
    pub fn command(&self, bearing_deg: f32) -> ActuatorCommand {
        let bearing = if bearing_deg.is_finite() {
            bearing_deg
        } else {
            0.0
        };
        let angle_deg =
            (self.center_offset_deg + bearing).clamp(self.min_angle_deg, self.max_angle_deg);
        let span = self.max_angle_deg - self.min_angle_deg;
        let fraction = (angle_deg - self.min_angle_deg) / span;
        let pulse_width_us = self.min_pulse_us + fraction * (self.max_pulse_us - self.min_pulse_us);

        ActuatorCommand {
            angle_deg,
            pulse_width_us,
        }
    }

    pub fn center(&self) -> ActuatorCommand {
        self.command(0.0)
    }
}

/// Receiver of actuator commands (PWM driver, serial link, log, ...)
pub trait ActuatorSink: Send {
    fn issue(&mut self, command: ActuatorCommand) -> Result<()>;
}

impl<T: ActuatorSink + ?Sized> ActuatorSink for Box<T> {
    fn issue(&mut self, command: ActuatorCommand) -> Result<()> {
        (**self).issue(command)
    }
}

/// Logs every command at debug level
#[derive(Debug, Default)]
pub struct LogActuator {
    last: Option<ActuatorCommand>,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActuatorSink for LogActuator {
    fn issue(&mut self, command: ActuatorCommand) -> Result<()> {
        if self.last.map(|c| c.angle_step()) != Some(command.angle_step()) {
            log::debug!(
                "Actuator -> {}° ({} us)",
                command.angle_step(),
                command.pulse_us()
            );
        }
        self.last = Some(command);
        Ok(())
    }
}

/// Keeps every issued command in order
#[derive(Debug, Default)]
pub struct RecordingActuator {
    commands: Vec<ActuatorCommand>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[ActuatorCommand] {
        &self.commands
    }

    pub fn last(&self) -> Option<&ActuatorCommand> {
        self.commands.last()
    }
}

impl ActuatorSink for RecordingActuator {
    fn issue(&mut self, command: ActuatorCommand) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}
