//! Actuator control: the pump state machine and the valve bank it is
//! interlocked with.

pub mod pump;
pub mod valves;
