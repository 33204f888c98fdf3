// cvcheck-core/src/domain/checks/data.rs

use super::CheckContext;
use super::context::unravel;
use crate::domain::error::CollaboratorError;
use crate::domain::project::{DataCheck, OutlierMethod};
use crate::domain::scoring::OutcomeBuilder;
use crate::ports::VariableInfo;

pub fn run(
    ctx: &CheckContext<'_>,
    check: &DataCheck,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let name = match check {
        DataCheck::NanInf { variable, .. }
        | DataCheck::Constant { variable, .. }
        | DataCheck::FillValue { variable }
        | DataCheck::Outlier { variable, .. }
        | DataCheck::ChunkSize { variable, .. }
        | DataCheck::ActualRange { variable }
        | DataCheck::StatisticalOutlier { variable, .. } => variable,
    };
    let Some(var) = ctx.variable(name)? else {
        out.skip(format!("variable '{}' is absent", name));
        return Ok(());
    };

    match check {
        DataCheck::ChunkSize {
            max_chunk_shape,
            max_chunk_elements,
            ..
        } => return chunk_size(ctx, &var, max_chunk_shape.as_deref(), *max_chunk_elements, out),
        DataCheck::FillValue { .. } => {
            fill_value(&var, out);
            return Ok(());
        }
        _ => {}
    }

    if !var.dtype.is_numeric() {
        out.skip(format!("'{}' is not numeric ({})", var.name, var.dtype));
        return Ok(());
    }

    match check {
        DataCheck::NanInf {
            allow_nan,
            allow_inf,
            ..
        } => nan_inf(ctx, &var, *allow_nan, *allow_inf, out),
        DataCheck::Constant { tolerance, .. } => {
            let eps = tolerance.unwrap_or(ctx.config.data.constant_tolerance);
            constant(ctx, &var, eps, out)
        }
        DataCheck::Outlier { min, max, .. } => outlier(ctx, &var, *min, *max, out),
        DataCheck::ActualRange { .. } => actual_range(ctx, &var, out),
        DataCheck::StatisticalOutlier {
            method,
            threshold,
            time_dimension,
            ..
        } => {
            let threshold = threshold.unwrap_or(method.default_threshold());
            statistical_outlier(ctx, &var, *method, threshold, time_dimension, out)
        }
        DataCheck::FillValue { .. } | DataCheck::ChunkSize { .. } => Ok(()),
    }
}

/// Values matching a declared fill or missing value are left out of statistics.
struct FillMask(Vec<f64>);

impl FillMask {
    fn of(var: &VariableInfo) -> Self {
        Self(var.fill_values())
    }

    fn is_fill(&self, v: f64) -> bool {
        self.0.iter().any(|f| *f == v || (f.is_nan() && v.is_nan()))
    }
}

/// Counts occurrences and keeps the first few positions.
struct Tally {
    count: usize,
    first: Vec<usize>,
    limit: usize,
}

impl Tally {
    fn new(limit: usize) -> Self {
        Self {
            count: 0,
            first: Vec::new(),
            limit,
        }
    }

    fn hit(&mut self, index: usize) {
        self.count += 1;
        if self.first.len() < self.limit {
            self.first.push(index);
        }
    }

    fn positions(&self, shape: &[u64]) -> String {
        self.first
            .iter()
            .map(|i| unravel(*i, shape))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn nan_inf(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    allow_nan: bool,
    allow_inf: bool,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    if allow_nan && allow_inf {
        out.skip("both NaN and Inf are permitted");
        return Ok(());
    }

    let mask = FillMask::of(var);
    let mut nans = Tally::new(ctx.max_reported());
    let mut infs = Tally::new(ctx.max_reported());
    ctx.for_each_value(var, |i, v| {
        if mask.is_fill(v) {
            return;
        }
        if v.is_nan() {
            nans.hit(i);
        } else if v.is_infinite() {
            infs.hit(i);
        }
    })?;

    for (allowed, tally, what) in [(allow_nan, &nans, "NaN"), (allow_inf, &infs, "Inf")] {
        if allowed {
            continue;
        }
        if tally.count == 0 {
            out.add_pass(format!("'{}' contains no {}", var.name, what));
        } else {
            out.add_failure(format!(
                "'{}' contains {} {} value(s), first at {}",
                var.name,
                tally.count,
                what,
                tally.positions(&var.shape)
            ));
        }
    }
    Ok(())
}

fn constant(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    eps: f64,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let mask = FillMask::of(var);
    let mut range: Option<(f64, f64)> = None;
    ctx.for_each_value(var, |_, v| {
        if !v.is_finite() || mask.is_fill(v) {
            return;
        }
        range = Some(match range {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    })?;

    let Some((lo, hi)) = range else {
        out.skip(format!("'{}' holds no valid values", var.name));
        return Ok(());
    };
    if hi - lo <= eps {
        out.add_failure(format!(
            "'{}' is constant within {} (min {}, max {})",
            var.name, eps, lo, hi
        ));
    } else {
        out.add_pass(format!("'{}' varies (min {}, max {})", var.name, lo, hi));
    }
    Ok(())
}

fn valid_range(var: &VariableInfo) -> Option<(f64, f64)> {
    if let Some(range) = var.attribute("valid_range") {
        if let [lo, hi] = range.as_numbers()[..] {
            return Some((lo, hi));
        }
    }
    let min = var.attribute("valid_min").and_then(|v| v.as_numbers().first().copied());
    let max = var.attribute("valid_max").and_then(|v| v.as_numbers().first().copied());
    match (min, max) {
        (None, None) => None,
        (min, max) => Some((min.unwrap_or(f64::NEG_INFINITY), max.unwrap_or(f64::INFINITY))),
    }
}

fn fill_value(var: &VariableInfo, out: &mut OutcomeBuilder) {
    let fills = var.fill_values();
    if fills.is_empty() {
        out.skip(format!("'{}' declares no fill or missing value", var.name));
        return;
    }
    let Some((lo, hi)) = valid_range(var) else {
        out.note(format!("'{}' declares no valid range", var.name));
        return;
    };
    for fill in fills {
        if fill.is_nan() || fill < lo || fill > hi {
            out.add_pass(format!("fill value {} lies outside [{}, {}]", fill, lo, hi));
        } else {
            out.add_failure(format!(
                "'{}': fill value {} lies inside the valid range [{}, {}]",
                var.name, fill, lo, hi
            ));
        }
    }
}

fn outlier(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    min: f64,
    max: f64,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let mask = FillMask::of(var);
    let mut tally = Tally::new(ctx.max_reported());
    let mut lowest: Option<f64> = None;
    let mut highest: Option<f64> = None;

    ctx.for_each_value(var, |i, v| {
        if v.is_nan() || mask.is_fill(v) {
            return;
        }
        if v < min {
            tally.hit(i);
            lowest = Some(lowest.map_or(v, |l| l.min(v)));
        } else if v > max {
            tally.hit(i);
            highest = Some(highest.map_or(v, |h| h.max(v)));
        }
    })?;

    if tally.count == 0 {
        out.add_pass(format!("all '{}' values lie within [{}, {}]", var.name, min, max));
        return Ok(());
    }

    let mut extremes = Vec::new();
    if let Some(l) = lowest {
        extremes.push(format!("lowest {}", l));
    }
    if let Some(h) = highest {
        extremes.push(format!("highest {}", h));
    }
    out.add_failure(format!(
        "'{}' has {} value(s) outside [{}, {}] ({}), first at {}",
        var.name,
        tally.count,
        min,
        max,
        extremes.join(", "),
        tally.positions(&var.shape)
    ));
    Ok(())
}

fn actual_range(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let Some(declared) = var.attribute("actual_range") else {
        out.skip(format!("'{}' declares no actual_range", var.name));
        return Ok(());
    };
    let numbers = declared.as_numbers();
    let (lo, hi) = match numbers[..] {
        [lo, hi] => (lo, hi),
        _ => {
            out.add_failure(format!(
                "'{}': actual_range has {} element(s), expected 2",
                var.name,
                numbers.len()
            ));
            return Ok(());
        }
    };

    let mask = FillMask::of(var);
    let mut range: Option<(f64, f64)> = None;
    ctx.for_each_value(var, |_, v| {
        if v.is_nan() || mask.is_fill(v) {
            return;
        }
        range = Some(match range {
            Some((min, max)) => (min.min(v), max.max(v)),
            None => (v, v),
        });
    })?;

    match range {
        None => out.add_pass(format!("'{}' holds no valid values", var.name)),
        Some((min, max)) if min >= lo && max <= hi => out.add_pass(format!(
            "'{}' data [{}, {}] lies within actual_range [{}, {}]",
            var.name, min, max, lo, hi
        )),
        Some((min, max)) => out.add_failure(format!(
            "'{}': data range [{}, {}] is outside actual_range [{}, {}]",
            var.name, min, max, lo, hi
        )),
    }
    Ok(())
}

// --- SPATIAL OUTLIERS ---

/// Running mean and population variance (Welford).
#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn update(&mut self, value: f64) {
        self.count += 1;
        let old_mean = self.mean;
        self.mean += (value - old_mean) / self.count as f64;
        self.m2 += (value - old_mean) * (value - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).sqrt()
    }
}

/// Linear-interpolated percentile of sorted values, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };
    let pos = q * last as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Indices into `series` whose value is an outlier across the series.
/// `None` entries are points that never held a valid value.
fn screen(series: &[Option<f64>], method: OutlierMethod, threshold: f64) -> Vec<usize> {
    let valid = || series.iter().enumerate().filter_map(|(i, v)| v.map(|v| (i, v)));
    match method {
        OutlierMethod::ZScore => {
            let mut moments = Moments::default();
            valid().for_each(|(_, v)| moments.update(v));
            let stddev = moments.stddev();
            if stddev <= 1e-9 {
                return Vec::new();
            }
            valid()
                .filter(|(_, v)| ((v - moments.mean) / stddev).abs() > threshold)
                .map(|(i, _)| i)
                .collect()
        }
        OutlierMethod::Iqr => {
            let mut sorted: Vec<f64> = valid().map(|(_, v)| v).collect();
            sorted.sort_by(f64::total_cmp);
            let q1 = percentile(&sorted, 0.25);
            let q3 = percentile(&sorted, 0.75);
            let iqr = q3 - q1;
            let (lo, hi) = (q1 - threshold * iqr, q3 + threshold * iqr);
            valid()
                .filter(|(_, v)| *v < lo || *v > hi)
                .map(|(i, _)| i)
                .collect()
        }
    }
}

/// Reduces the variable to its minimum and maximum over time at every grid
/// point, then screens both series across the grid.
fn statistical_outlier(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    method: OutlierMethod,
    threshold: f64,
    time_dimension: &str,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    let Some(axis) = var.dimensions.iter().position(|d| d == time_dimension) else {
        out.skip(format!(
            "'{}' has no '{}' dimension",
            var.name, time_dimension
        ));
        return Ok(());
    };
    if var.shape.len() != var.dimensions.len() {
        out.add_failure(format!(
            "'{}': rank {} does not match its {} dimensions",
            var.name,
            var.shape.len(),
            var.dimensions.len()
        ));
        return Ok(());
    }

    let steps = var.shape[axis].max(1) as usize;
    let inner: usize = var.shape[axis + 1..].iter().map(|d| *d as usize).product();
    let spatial_shape: Vec<u64> = var
        .shape
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != axis)
        .map(|(_, d)| *d)
        .collect();
    let points: usize = spatial_shape.iter().map(|d| *d as usize).product();

    let mask = FillMask::of(var);
    let mut minima: Vec<Option<f64>> = vec![None; points];
    let mut maxima: Vec<Option<f64>> = vec![None; points];
    ctx.for_each_value(var, |i, v| {
        if !v.is_finite() || mask.is_fill(v) {
            return;
        }
        let point = (i / (steps * inner)) * inner + i % inner;
        if let (Some(lo), Some(hi)) = (minima.get_mut(point), maxima.get_mut(point)) {
            *lo = Some(lo.map_or(v, |l| l.min(v)));
            *hi = Some(hi.map_or(v, |h| h.max(v)));
        }
    })?;

    let low = screen(&minima, method, threshold);
    let high = screen(&maxima, method, threshold);
    if low.is_empty() && high.is_empty() {
        out.add_pass(format!(
            "no {} outliers in '{}' (threshold {})",
            method.as_str(),
            var.name,
            threshold
        ));
        return Ok(());
    }

    let mut tally = Tally::new(ctx.max_reported());
    low.iter().chain(&high).for_each(|p| tally.hit(*p));
    out.add_failure(format!(
        "'{}' has {} {} outlier point(s) ({} in the minimum series, {} in the maximum series), first at {}",
        var.name,
        tally.count,
        method.as_str(),
        low.len(),
        high.len(),
        tally.positions(&spatial_shape)
    ));
    Ok(())
}

fn chunk_size(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    max_shape: Option<&[u64]>,
    max_elements: Option<u64>,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    if max_shape.is_none() && max_elements.is_none() {
        out.skip("no chunk limit configured");
        return Ok(());
    }

    // Contiguous storage is one chunk spanning the whole variable.
    let chunk = match ctx.dataset.chunking(&var.name)? {
        Some(c) => c,
        None => {
            out.note(format!("'{}' is stored contiguously", var.name));
            var.shape.clone()
        }
    };

    if let Some(limit) = max_shape {
        if limit.len() != chunk.len() {
            out.add_failure(format!(
                "'{}': chunk rank {} does not match the configured limit rank {}",
                var.name,
                chunk.len(),
                limit.len()
            ));
        } else if chunk.iter().zip(limit).all(|(c, l)| c <= l) {
            out.add_pass(format!("'{}' chunk {:?} within {:?}", var.name, chunk, limit));
        } else {
            out.add_failure(format!(
                "'{}': chunk {:?} exceeds {:?}",
                var.name, chunk, limit
            ));
        }
    }

    if let Some(limit) = max_elements {
        let elements: u64 = chunk.iter().product();
        if elements <= limit {
            out.add_pass(format!("'{}' chunk holds {} elements", var.name, elements));
        } else {
            out.add_failure(format!(
                "'{}': chunk holds {} elements, limit is {}",
                var.name, elements, limit
            ));
        }
    }
    Ok(())
}
