pub mod midi;
pub mod transport;
