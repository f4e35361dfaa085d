//! Hardware initialisation and timer drivers.

pub mod hw_init;
pub mod hw_timer;
