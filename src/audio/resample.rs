use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AnalysisError;

/// Resample mono f32 audio from `from_rate` to `to_rate`.
///
/// Equal rates return the input untouched. Otherwise a single sinc pass runs
/// over the whole signal, the tail is flushed and the result is trimmed to
/// `ceil(len * to_rate / from_rate)` samples.
pub fn resample(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, AnalysisError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AnalysisError::Resample(format!(
            "cannot resample {}Hz -> {}Hz",
            from_rate, to_rate
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        samples.len(),
        1, // mono
    )
    .map_err(|e| AnalysisError::Resample(e.to_string()))?;

    // A single chunk holding the whole signal comes back already aligned to
    // the input; only the tail is still held in the sinc history.
    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| AnalysisError::Resample(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    while output.len() < expected {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    output.resize(expected, 0.0);
    Ok(output)
}
