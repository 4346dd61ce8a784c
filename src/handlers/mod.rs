pub mod health;
pub mod waves;
