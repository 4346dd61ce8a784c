use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::models::status::{WaveSnapshot, WaveStatus};

#[derive(Debug)]
pub struct WaveStateInner {
    pub status: RwLock<WaveStatus>,
    pub broadcaster: broadcast::Sender<WaveSnapshot>,
}

pub type SharedWaveState = Arc<WaveStateInner>;

pub fn new_shared_state() -> SharedWaveState {
    let (broadcaster, _receiver) = broadcast::channel(16);
    Arc::new(WaveStateInner {
        status: RwLock::new(WaveStatus::default()),
        broadcaster,
    })
}
