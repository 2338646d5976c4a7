//! GPIO drivers: relay coils and the thermal cutoff input.

pub mod overheat;
pub mod relay;
