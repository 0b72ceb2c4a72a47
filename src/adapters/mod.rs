//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements     | Connects to                  |
//! |------------|----------------|------------------------------|
//! | `ble`      | (transport)    | Bluedroid GATT server        |
//! | `log_sink` | EventSink      | Serial log output            |
//! | `nvs`      | ConfigPort     | NVS / in-memory store        |
//! | `ota_sink` | UpdateSink     | esp-ota / in-memory slots    |
//! | `system`   | SystemControl  | SoC restart / simulation     |

pub mod ble;
pub mod log_sink;
pub mod nvs;
pub mod ota_sink;
pub mod system;
pub(crate) mod utils;
