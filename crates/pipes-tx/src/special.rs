use pipes_core::Result;

use crate::func2_unblocked::Func2Unblocked;

const MAX_LAG_MAG: i32 = 100;

fn calc_rms_error(left: &[f64], right: &[f64], lag: i32) -> f64 {
    let n_in = left.len() as i32;
    let mut sum = 0.0;
    if lag >= 0 {
        for i in 0..(n_in - lag) {
            let diff = left[i as usize] - right[(i + lag) as usize];
            sum += diff * diff;
        }
        sum.sqrt() / (n_in - lag) as f64
    } else {
        let lag = -lag;
        for i in 0..(n_in - lag) {
            let diff = left[(i + lag) as usize] - right[i as usize];
            sum += diff * diff;
        }
        sum.sqrt() / (n_in - lag) as f64
    }
}

/// Scans lag offsets from 0 up to `MAX_LAG_MAG` in both directions,
/// testing `+lag` before `-lag` at each step with a strict `<` compare -
/// so among equally good lags the smallest magnitude wins, and among a
/// tied magnitude the positive lag wins (it is tested, and kept, first).
fn test(left: &[f64], right: &[f64]) -> Result<[f64; 2]> {
    if left.len() as i32 <= MAX_LAG_MAG {
        return Err(pipes_core::PipesError::Structure {
            tool: "special",
            reason: "row is too short to scan the full lag range".into(),
        });
    }

    let mut best_lag = 0i32;
    let mut best_rms = calc_rms_error(left, right, best_lag);

    for lag in 1..=MAX_LAG_MAG {
        let rms = calc_rms_error(left, right, lag);
        if rms < best_rms {
            best_rms = rms;
            best_lag = lag;
        }
        let rms = calc_rms_error(left, right, -lag);
        if rms < best_rms {
            best_rms = rms;
            best_lag = -lag;
        }
    }

    Ok([best_rms, best_lag as f64])
}

/// A `Func2Unblocked` instantiated to compute, per row, the RMS alignment
/// error and best-fit lag between the left and right rows: output row 0
/// is the RMS error, row 1 is the lag (as a float) that minimizes it.
pub fn create() -> Func2Unblocked {
    Func2Unblocked::new(2, move |left: &[f64], right: &[f64], out: &mut [f64]| {
        let result = test(left, right)?;
        out.copy_from_slice(&result);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_source::ZeroSource;
    use pipes_core::{Arena, SourceHandle};

    #[test]
    fn zero_rows_have_zero_rms_and_zero_lag() {
        let mut arena = Arena::new();
        let left = arena.insert(Box::new(ZeroSource::new("t", "256").unwrap()));
        let right = arena.insert(Box::new(ZeroSource::new("t", "256").unwrap()));
        let special_id = arena.insert(Box::new(create()));
        arena
            .connect(special_id, 0, SourceHandle { tool: left, index: 0 })
            .unwrap();
        arena
            .connect(special_id, 1, SourceHandle { tool: right, index: 0 })
            .unwrap();
        arena.init(special_id).unwrap();

        let handle = SourceHandle { tool: special_id, index: 0 };
        let mut buf = vec![9.0f64; 2];
        let n = arena.get_float64_chunk(handle, 2, 0, &mut buf);
        assert_eq!(n, 2);
        assert_eq!(buf, vec![0.0, 0.0]);
    }

    #[test]
    fn ties_favor_smallest_then_positive_lag() {
        // Identical left/right rows give RMS error 0 at every lag, so the
        // scan should settle on lag 0 (tested first, strict `<` means no
        // later equal value overwrites it).
        let row = vec![1.0f64; 256];
        let result = test(&row, &row).unwrap();
        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 0.0);
    }
}
