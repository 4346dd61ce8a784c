use crate::models::wave::{FalseBreakoutSignal, WavePeak};

/// Check the last three completed waves for a failed breakout.
///
/// Signals when neither of the two later peaks exceeds the first one.
pub fn evaluate(waves: &[WavePeak]) -> Option<FalseBreakoutSignal> {
    let [p1, p2, p3] = waves.get(waves.len().checked_sub(3)?..)? else {
        return None;
    };

    let reference_high = p1.a.value;
    if p2.a.value <= reference_high && p3.a.value <= reference_high {
        Some(FalseBreakoutSignal {
            reference_high,
            peaks: [p1.clone(), p2.clone(), p3.clone()],
        })
    } else {
        None
    }
}
