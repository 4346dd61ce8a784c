pub mod config;
pub mod confirmation;
pub mod false_breakout;
pub mod wave_chain;
pub mod wave_detector;
