use std::ops::Range;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, info};

use crate::consts::{RIDGE_LAMBDA_SCALES, VIDEO_HIGHPASS_ORDER};
use crate::denoise::{correct_shrinkage, DenoisedTrace, MatchedFilterDenoiser};
use crate::error::{Result, SpikePursuitError};
use crate::filters::{blur_frames, gaussian_blur, highpass_video};
use crate::io::VideoSource;
use crate::regression::{cross_validate, lambda_grid, with_intercept, BackgroundSubtractor, RidgeSolver};
use crate::roi::{align_mask, CellRegion};
use crate::stats::spike_snr;
use crate::trace::PixelTrace;

use super::config::SpikePursuitConfig;
use super::locality::{correlation_map, locality_test};
use super::types::{CellStage, IterationState, ProgressReporter, RawRoiRecord, ResultRecord};

/// Context crop of one cell, flattened to frames x pixels (row-major pixels).
#[derive(Clone, Debug)]
pub struct PreparedCell {
    pub region: CellRegion,
    /// Temporal mean of the crop.
    pub mean_image: Array2<f64>,
    /// Pixel time courses with their temporal means removed.
    pub data: Array2<f64>,
}

impl PreparedCell {
    pub fn frames(&self) -> usize {
        self.data.nrows()
    }
}

/// Align the mask, read the context crop and demean every pixel.
pub fn prepare_cell<V>(video: &V, mask: &Array2<bool>, config: &SpikePursuitConfig) -> Result<PreparedCell>
where
    V: VideoSource + ?Sized,
{
    let (frames, height, width) = video.dims();
    let mask = align_mask(mask, height, width)?;
    let region = CellRegion::new(&mask, config.context_size, config.censor_size)?;
    let crop = video.read_region(0..frames, region.window.rows(), region.window.cols())?;

    let (h, w) = (region.height(), region.width());
    let mean_image = crop
        .mean_axis(Axis(0))
        .ok_or_else(|| SpikePursuitError::degenerate("video has no frames"))?;
    let data = Array2::from_shape_fn((frames, h * w), |(t, p)| {
        crop[[t, p / w, p % w]] - mean_image[[p / w, p % w]]
    });
    debug!(frames, height = h, width = w, "Context crop prepared");

    Ok(PreparedCell {
        region,
        mean_image,
        data,
    })
}

/// Mean of the ROI pixel columns, demeaned.
pub fn roi_trace(data: ArrayView2<f64>, roi: &[usize]) -> Result<Array1<f64>> {
    if roi.is_empty() {
        return Err(SpikePursuitError::degenerate("ROI has no pixels inside the crop"));
    }
    let trace = data.select(Axis(1), roi).mean_axis(Axis(1)).unwrap_or_default();
    let mean = trace.mean().unwrap_or(0.0);
    Ok(trace.mapv(|v| v - mean))
}

/// Trace minus its no-intercept least-squares fit on `reference`.
pub fn global_subtract(trace: ArrayView1<f64>, reference: ArrayView1<f64>) -> Array1<f64> {
    let energy = reference.dot(&reference);
    if energy <= 0.0 {
        return trace.to_owned();
    }
    let coef = reference.dot(&trace) / energy;
    &trace - &(&reference * coef)
}

/// Per-frame mean over the ROI of the slow signal plus the mean image.
pub fn baseline_f0(data_lp: ArrayView2<f64>, mean_image: &Array2<f64>, roi: &[usize]) -> Array1<f64> {
    let mean_flat: Vec<f64> = mean_image.iter().copied().collect();
    let n = roi.len().max(1) as f64;
    data_lp
        .rows()
        .into_iter()
        .map(|row| roi.iter().map(|&p| row[p] + mean_flat[p]).sum::<f64>() / n)
        .collect()
}

/// Products of the initial (pre-refinement) estimate.
#[derive(Clone, Debug)]
pub struct InitialEstimate {
    /// Drift-removed pixel time courses.
    pub data_hp: Array2<f64>,
    /// The removed slow component, `data - data_hp`.
    pub data_lp: Array2<f64>,
    /// Pixel time courses used to build the regression predictor.
    pub data_pred: Array2<f64>,
    /// Background-subtracted ROI trace.
    pub trace: Array1<f64>,
    pub background: BackgroundSubtractor,
    /// Mean drift-removed trace over the background pixels.
    pub background_mean: Array1<f64>,
    /// Denoising of the negated trace.
    pub raw: DenoisedTrace,
}

/// High-pass the crop, subtract the background from the ROI trace and denoise it.
pub fn initial_estimate(prepared: &PreparedCell, config: &SpikePursuitConfig) -> Result<InitialEstimate> {
    let sr = config.sample_rate;
    let data_hp = highpass_video(&prepared.data, 1.0 / config.tau_lp, sr, VIDEO_HIGHPASS_ORDER)?;
    let data_lp = &prepared.data - &data_hp;
    let data_pred = if config.high_pass_regression {
        highpass_video(&prepared.data, 1.0 / config.tau_pred, sr, VIDEO_HIGHPASS_ORDER)?
    } else {
        data_hp.clone()
    };

    let roi = prepared.region.roi_indices();
    let raw_trace = roi_trace(data_hp.view(), &roi)?;

    let bg_pixels = prepared.region.background_indices();
    let bg_data = data_hp.select(Axis(1), &bg_pixels);
    let background = BackgroundSubtractor::fit(bg_data.view(), config.n_pc_bg)?;
    let background_mean = bg_data
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(data_hp.nrows()));
    let trace = background.subtract(raw_trace.view())?;

    let denoiser = MatchedFilterDenoiser::new(config.half_window(), config.initial_clip);
    let raw = denoiser.denoise(&PixelTrace::new(trace.mapv(|v| -v), sr))?;
    info!(
        spikes = raw.spikes.len(),
        background_rank = background.rank(),
        low_spikes = raw.low_spikes,
        "Initial estimate"
    );

    Ok(InitialEstimate {
        data_hp,
        data_lp,
        data_pred,
        trace,
        background,
        background_mean,
        raw,
    })
}

/// Intercept column followed by the per-frame Gaussian blur of `data`.
pub fn blurred_predictor(data: &Array2<f64>, height: usize, width: usize, sigma: f64) -> Result<Array2<f64>> {
    let blurred = blur_frames(data, height, width, sigma)?;
    Ok(with_intercept(blurred.view()))
}

/// Frames used as regression rows.
pub fn regression_rows(frames: usize, config: &SpikePursuitConfig) -> Result<Range<usize>> {
    let (head, tail) = config.regression_margins();
    if head + tail >= frames {
        return Err(SpikePursuitError::degenerate(format!(
            "{frames} frames leave no regression rows after excluding {head} + {tail} edge frames"
        )));
    }
    Ok(head..frames - tail)
}

/// Ridge regression set-up shared by every refinement iteration.
pub struct RegressionDesign {
    pub sigma: f64,
    pub lambda: f64,
    /// Blurred predictor over all frames, intercept first.
    pub predictor: Array2<f64>,
    /// Blurred drift-removed data over all frames, intercept first.
    pub reconstruction: Array2<f64>,
    pub rows: Range<usize>,
    pub cv_errors: Option<Vec<Vec<f64>>>,
    solver: RidgeSolver,
}

impl RegressionDesign {
    /// Choose the blur scale and penalty, then factorize the normal equations once.
    pub fn build(
        prepared: &PreparedCell,
        initial: &InitialEstimate,
        config: &SpikePursuitConfig,
    ) -> Result<Self> {
        let (h, w) = (prepared.region.height(), prepared.region.width());
        let rows = regression_rows(prepared.frames(), config)?;

        let (sigma_index, lambda_index, cv_errors) = if config.do_cross_val {
            let target = initial.raw.guess.slice(s![rows.clone()]);
            let cv = cross_validate(
                &config.sigmas,
                &RIDGE_LAMBDA_SCALES,
                target,
                config.cv_folds,
                |sigma| {
                    let p = blurred_predictor(&initial.data_pred, h, w, sigma)?;
                    Ok(p.slice(s![rows.clone(), ..]).to_owned())
                },
            )?;
            info!(
                sigma = config.sigmas[cv.sigma_index],
                lambda_index = cv.lambda_index,
                "Cross-validation selected"
            );
            (cv.sigma_index, cv.lambda_index, Some(cv.errors))
        } else {
            (config.sigma_index, config.lambda_index, None)
        };

        let sigma = config.sigmas[sigma_index];
        let predictor = blurred_predictor(&initial.data_pred, h, w, sigma)?;
        let reconstruction = if config.high_pass_regression {
            blurred_predictor(&initial.data_hp, h, w, sigma)?
        } else {
            predictor.clone()
        };

        let selected = predictor.slice(s![rows.clone(), ..]);
        let lambda = lambda_grid(selected, &RIDGE_LAMBDA_SCALES)[lambda_index];
        let solver = RidgeSolver::new(selected, lambda)?;
        debug!(sigma, lambda, rows = rows.len(), "Regression design");

        Ok(Self {
            sigma,
            lambda,
            predictor,
            reconstruction,
            rows,
            cv_errors,
            solver,
        })
    }

    /// Weights (intercept first) fitting the guess signal on the regression rows.
    pub fn weights(&self, guess: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.solver.solve(guess.slice(s![self.rows.clone()]))
    }
}

/// State after the initial estimate, before any refinement.
pub fn initial_state(prepared: &PreparedCell, initial: &InitialEstimate) -> IterationState {
    let snr = spike_snr(
        initial.raw.denoised.as_slice().unwrap_or_default(),
        initial.raw.spikes.indices(),
    );
    IterationState {
        trace: initial.trace.clone(),
        denoised: initial.raw.clone(),
        spatial_filter: prepared.region.roi.mapv(|v| if v { 1.0 } else { 0.0 }),
        weights: Array1::zeros(0),
        snr,
    }
}

/// One alternation: spatial filter from the current guess, then a new trace and its spikes.
pub fn refine_iteration(
    previous: &IterationState,
    prepared: &PreparedCell,
    initial: &InitialEstimate,
    design: &RegressionDesign,
    config: &SpikePursuitConfig,
    last: bool,
) -> Result<IterationState> {
    let (h, w) = (prepared.region.height(), prepared.region.width());
    let weights = design.weights(previous.denoised.guess.view())?;

    let mut trace = design.reconstruction.dot(&weights);
    let mean = trace.mean().unwrap_or(0.0);
    trace.mapv_inplace(|v| v - mean);

    let filter = Array2::from_shape_fn((h, w), |(r, c)| weights[1 + r * w + c]);
    let spatial_filter = gaussian_blur(filter.view(), design.sigma);

    if !last {
        trace = initial.background.subtract(trace.view())?;
    } else if config.do_global_subtract {
        trace = global_subtract(trace.view(), initial.background_mean.view());
    }

    let trace = Array1::from_vec(correct_shrinkage(
        trace.as_slice().unwrap_or_default(),
        initial.trace.as_slice().unwrap_or_default(),
        &previous.denoised.spikes,
    )?);

    let denoiser = MatchedFilterDenoiser::new(config.half_window(), config.refine_clip);
    let denoised = denoiser.denoise(&PixelTrace::new(trace.mapv(|v| -v), config.sample_rate))?;
    let snr = spike_snr(
        denoised.denoised.as_slice().unwrap_or_default(),
        denoised.spikes.indices(),
    );

    Ok(IterationState {
        trace,
        denoised,
        spatial_filter,
        weights,
        snr,
    })
}

/// Runs the full per-cell pipeline with a fixed number of iterations.
#[derive(Clone, Debug)]
pub struct SpatialTemporalRefiner {
    config: SpikePursuitConfig,
}

impl SpatialTemporalRefiner {
    pub fn new(config: SpikePursuitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SpikePursuitConfig {
        &self.config
    }

    pub fn run<V>(
        &self,
        cell_id: usize,
        video: &V,
        mask: &Array2<bool>,
        reporter: &dyn ProgressReporter,
    ) -> Result<ResultRecord>
    where
        V: VideoSource + ?Sized,
    {
        let config = &self.config;

        reporter.stage(cell_id, CellStage::Reading);
        let prepared = prepare_cell(video, mask, config)?;

        reporter.stage(cell_id, CellStage::InitialEstimate);
        let initial = initial_estimate(&prepared, config)?;
        let raw_state = initial_state(&prepared, &initial);

        if config.do_cross_val {
            reporter.stage(cell_id, CellStage::CrossValidation);
        }
        let design = RegressionDesign::build(&prepared, &initial, config)?;

        let mut num_spikes = vec![raw_state.spike_count()];
        let mut state = raw_state.clone();
        for i in 0..config.n_iter {
            reporter.stage(cell_id, CellStage::Iteration(i + 1));
            state = refine_iteration(&state, &prepared, &initial, &design, config, i + 1 == config.n_iter)?;
            debug!(cell_id, iteration = i + 1, spikes = state.spike_count(), snr = state.snr, "Iteration");
            num_spikes.push(state.spike_count());
        }

        reporter.stage(cell_id, CellStage::Finalizing);
        let record = finalize(cell_id, &prepared, &initial, &design, &raw_state, state, num_spikes);
        info!(
            cell_id,
            spikes = record.spike_times.len(),
            snr = record.snr,
            passed_locality_test = record.passed_locality_test,
            "Cell complete"
        );
        Ok(record)
    }
}

/// Locality test, baseline and the assembled result record.
pub fn finalize(
    cell_id: usize,
    prepared: &PreparedCell,
    initial: &InitialEstimate,
    design: &RegressionDesign,
    raw_state: &IterationState,
    state: IterationState,
    num_spikes: Vec<usize>,
) -> ResultRecord {
    let roi = prepared.region.roi_indices();
    let background = prepared.region.background_indices();

    let negated_guess = state.denoised.guess.mapv(|v| -v);
    let correlation = correlation_map(
        design.predictor.slice(s![.., 1..]),
        negated_guess.view(),
    );
    let passed_locality_test = locality_test(&correlation, &roi, &background);

    let f0 = baseline_f0(initial.data_lp.view(), &prepared.mean_image, &roi);
    let dff = &state.trace / &f0;
    let raw_dff = &initial.trace / &f0;

    let raw_roi = RawRoiRecord {
        trace: initial.trace.clone(),
        denoised: initial.raw.denoised.mapv(|v| -v),
        spike_times: initial.raw.spikes.clone(),
        spatial_mask: prepared.region.roi.clone(),
        false_pos_rate: initial.raw.false_pos_rate,
        detection_rate: initial.raw.detection_rate,
        template: initial.raw.template.clone(),
        snr: raw_state.snr,
        dff: raw_dff,
    };

    let IterationState {
        trace,
        denoised,
        spatial_filter,
        weights,
        snr,
    } = state;

    ResultRecord {
        cell_id,
        mean_image: prepared.mean_image.clone(),
        raw_roi,
        trace,
        denoised: denoised.denoised.mapv(|v| -v),
        roi_bbox: prepared.region.window,
        roi_mask: prepared.region.roi.clone(),
        spatial_filter,
        false_pos_rate: denoised.false_pos_rate,
        detection_rate: denoised.detection_rate,
        template: denoised.template,
        spike_times: denoised.spikes,
        background_basis: initial.background.basis().clone(),
        low_spikes: initial.raw.low_spikes,
        passed_locality_test,
        snr,
        f0,
        dff,
        num_spikes,
        weights,
        sigma: design.sigma,
        lambda: design.lambda,
        cv_errors: design.cv_errors.clone(),
    }
}
