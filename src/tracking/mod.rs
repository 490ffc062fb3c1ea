pub mod actuator;
pub mod tracker;

pub use actuator::{ActuatorCommand, ActuatorMapping, ActuatorSink, LogActuator, RecordingActuator};
pub use tracker::BearingTracker;
