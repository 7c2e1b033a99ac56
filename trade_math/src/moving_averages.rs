//! Rolling window averages
//!
//! - `rolling_mean`, the trailing-window mean over a slice
//! - `lagged`, the value a fixed number of steps back from the end of a slice

use crate::{MathError, Result};

/// Mean of the last `window` values of `values`
pub fn rolling_mean(values: &[f64], window: usize) -> Result<f64> {
    if window == 0 {
        return Err(MathError::InvalidInput(
            "Window must be greater than zero".to_string(),
        ));
    }
    if values.len() < window {
        return Err(MathError::InsufficientData(format!(
            "Need {} values for a rolling mean, have {}",
            window,
            values.len()
        )));
    }

    let tail = &values[values.len() - window..];
    Ok(tail.iter().sum::<f64>() / window as f64)
}

/// Value `lag` steps before the end of `values` (`lag = 1` is the last value).
pub fn lagged(values: &[f64], lag: usize) -> Result<f64> {
    if lag == 0 {
        return Err(MathError::InvalidInput("Lag must be at least 1".to_string()));
    }
    if values.len() < lag {
        return Err(MathError::InsufficientData(format!(
            "Need {} values for lag {}, have {}",
            lag,
            lag,
            values.len()
        )));
    }

    Ok(values[values.len() - lag])
}
