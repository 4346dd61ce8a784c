pub mod health;
pub mod sample;
pub mod status;
pub mod wave;
