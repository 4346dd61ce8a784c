use crate::business_logic::config::WaveConfig;
use crate::services::wave_state::SharedWaveState;

#[derive(Clone)]
pub struct AppState {
    pub wave_state: SharedWaveState,
    pub wave_config: WaveConfig,
}
