//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to              |
//! |------------|------------------|--------------------------|
//! | `hardware` | MoisturePort     | ESP32 ADC (soil probes)  |
//! |            | ActuatorPort     | ESP32 GPIO relays        |
//! | `log_sink` | EventSink        | Serial log output        |
//! | `nvs`      | ConfigPort       | NVS / in-memory store    |
//! |            | JobStorePort     |                          |
//! | `time`     | TimeAuthority    | SNTP + system clock      |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
