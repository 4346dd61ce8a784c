pub mod monitor;
pub mod series_source;
pub mod wave_state;
