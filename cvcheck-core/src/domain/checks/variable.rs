// cvcheck-core/src/domain/checks/variable.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::CheckContext;
use super::context::unravel;
use crate::domain::calendar::{self, Calendar, Step, TimeUnits};
use crate::domain::error::CollaboratorError;
use crate::domain::project::{Monotonic, VariableCheck};
use crate::domain::scoring::OutcomeBuilder;
use crate::ports::{CalendarDate, DatasetError, VariableInfo};

pub fn run(
    ctx: &CheckContext<'_>,
    check: &VariableCheck,
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    match check {
        VariableCheck::Existence { variable, required } => {
            match ctx.variable(variable)? {
                Some(_) => out.add_pass(format!("Variable '{}' exists", variable)),
                None if *required => {
                    out.add_failure(format!("Required variable '{}' is missing", variable))
                }
                None => out.skip(format!("optional variable '{}' is absent", variable)),
            }
            Ok(())
        }
        VariableCheck::Shape {
            variable,
            dimensions,
        } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("variable '{}' is absent", variable));
                return Ok(());
            };
            shape(ctx, &var, dimensions, out)
        }
        VariableCheck::Type { variable, expected } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("variable '{}' is absent", variable));
                return Ok(());
            };
            let allowed = expected.as_slice();
            if allowed.contains(&var.dtype) {
                out.add_pass(format!("'{}' has type {}", variable, var.dtype));
            } else {
                let names: Vec<&str> = allowed.iter().map(|t| t.as_str()).collect();
                out.add_failure(format!(
                    "'{}': expected type {}, found {}",
                    variable,
                    names.join(" or "),
                    var.dtype
                ));
            }
            Ok(())
        }
        VariableCheck::Bounds {
            variable,
            bounds_variable,
        } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("variable '{}' is absent", variable));
                return Ok(());
            };
            let Some(bounds_name) = bounds_variable.clone().or_else(|| bounds_attribute(&var))
            else {
                out.skip(format!("'{}' declares no bounds", variable));
                return Ok(());
            };
            let Some(bounds) = bounds_shape(ctx, &var, &bounds_name, out)? else {
                return Ok(());
            };
            within_bounds(ctx, &var, &bounds, out)?;
            Ok(())
        }
        VariableCheck::TimeAxis {
            variable,
            monotonic,
            check_bounds,
            check_filename_range,
        } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("time variable '{}' is absent", variable));
                return Ok(());
            };
            time_monotonic(ctx, &var, *monotonic, out)?;
            if *check_bounds {
                match bounds_attribute(&var) {
                    Some(name) => {
                        bounds_shape(ctx, &var, &name, out)?;
                    }
                    None => out.note(format!("'{}' declares no bounds variable", variable)),
                }
            }
            if *check_filename_range {
                filename_range(ctx, &var, out)?;
            }
            Ok(())
        }
        VariableCheck::BoundsContiguity {
            variable,
            bounds_variable,
        }
        | VariableCheck::BoundsMonotonicity {
            variable,
            bounds_variable,
        } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("variable '{}' is absent", variable));
                return Ok(());
            };
            let Some(bounds_name) = bounds_variable.clone().or_else(|| bounds_attribute(&var))
            else {
                out.skip(format!("'{}' declares no bounds", variable));
                return Ok(());
            };
            let Some(bounds) = bounds_shape(ctx, &var, &bounds_name, out)? else {
                return Ok(());
            };
            if matches!(check, VariableCheck::BoundsContiguity { .. }) {
                contiguity(ctx, &bounds, out)?;
            } else {
                bounds_monotonic(ctx, &bounds, out)?;
            }
            Ok(())
        }
        VariableCheck::TimeSquareness {
            variable,
            calendar,
            ref_time_units,
            increments,
            midpoint_frequencies,
        } => {
            let Some(var) = ctx.variable(variable)? else {
                out.skip(format!("time variable '{}' is absent", variable));
                return Ok(());
            };
            let policy = SquarenessPolicy {
                calendar: calendar.as_deref(),
                ref_time_units: ref_time_units.as_deref(),
                increments: VariableCheck::increment_table(increments),
                midpoint_frequencies,
            };
            squareness(ctx, &var, &policy, out)?;
            Ok(())
        }
    }
}

fn bounds_attribute(var: &VariableInfo) -> Option<String> {
    var.attribute("bounds")
        .or_else(|| var.attribute("climatology"))
        .map(|v| v.as_text())
}

fn shape(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    expected: &[String],
    out: &mut OutcomeBuilder,
) -> Result<(), CollaboratorError> {
    if var.dimensions == expected {
        out.add_pass(format!(
            "'{}' has dimensions ({})",
            var.name,
            var.dimensions.join(", ")
        ));
    } else {
        out.add_failure(format!(
            "'{}': expected dimensions ({}), found ({})",
            var.name,
            expected.join(", "),
            var.dimensions.join(", ")
        ));
    }

    let mut mismatches = Vec::new();
    if var.shape.len() != var.dimensions.len() {
        mismatches.push(format!(
            "rank {} for {} dimensions",
            var.shape.len(),
            var.dimensions.len()
        ));
    }
    for (dim, len) in var.dimensions.iter().zip(&var.shape) {
        match ctx.dataset.dimension_size(dim)? {
            Some(size) if size == *len => {}
            Some(size) => mismatches.push(format!("{} is {} but dimension is {}", dim, len, size)),
            None => mismatches.push(format!("dimension '{}' is not defined", dim)),
        }
    }
    if mismatches.is_empty() {
        out.add_pass(format!("'{}' shape matches its dimension sizes", var.name));
    } else {
        out.add_failure(format!(
            "'{}' shape does not match its dimensions: {}",
            var.name,
            mismatches.join("; ")
        ));
    }
    Ok(())
}

/// Asserts the bounds variable exists with shape (N, 2). Returns it when usable.
fn bounds_shape(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    bounds_name: &str,
    out: &mut OutcomeBuilder,
) -> Result<Option<VariableInfo>, CollaboratorError> {
    let Some(bounds) = ctx.variable(bounds_name)? else {
        out.add_failure(format!(
            "'{}' declares bounds '{}' but that variable is missing",
            var.name, bounds_name
        ));
        return Ok(None);
    };

    let n = var.element_count() as u64;
    if bounds.shape == [n, 2] {
        out.add_pass(format!("'{}' has shape ({}, 2)", bounds_name, n));
        Ok(Some(bounds))
    } else {
        out.add_failure(format!(
            "'{}': expected shape ({}, 2), found {:?}",
            bounds_name, n, bounds.shape
        ));
        Ok(None)
    }
}

fn within_bounds(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    bounds: &VariableInfo,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let total = var.element_count();
    let slab = ctx.config.reporting.slab_size.max(1);
    let limit = ctx.max_reported();

    let mut offenders = Vec::new();
    let mut count = 0usize;
    let mut start = 0;
    while start < total {
        let n = slab.min(total - start);
        let values = ctx.dataset.read_values(&var.name, start, n)?;
        let pairs = ctx.dataset.read_values(&bounds.name, start * 2, n * 2)?;
        for (i, (v, b)) in values.iter().zip(pairs.chunks_exact(2)).enumerate() {
            let (lo, hi) = (b[0].min(b[1]), b[0].max(b[1]));
            if !(lo <= *v && *v <= hi) {
                count += 1;
                if offenders.len() < limit {
                    offenders.push(format!("index {}: {} not in [{}, {}]", start + i, v, lo, hi));
                }
            }
        }
        start += n;
    }

    if count == 0 {
        out.add_pass(format!("all '{}' values lie within '{}'", var.name, bounds.name));
    } else {
        out.add_failure(format!(
            "{} value(s) of '{}' outside their bounds, first: {}",
            count,
            var.name,
            offenders.join("; ")
        ));
    }
    Ok(())
}

fn time_monotonic(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    direction: Monotonic,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let mut previous: Option<f64> = None;
    let mut first_break: Option<(usize, f64, f64)> = None;
    ctx.for_each_value(var, |i, v| {
        if let Some(p) = previous {
            let ordered = match direction {
                Monotonic::Increasing => v > p,
                Monotonic::Decreasing => v < p,
            };
            if !ordered && first_break.is_none() {
                first_break = Some((i, p, v));
            }
        }
        previous = Some(v);
    })?;

    let word = match direction {
        Monotonic::Increasing => "increasing",
        Monotonic::Decreasing => "decreasing",
    };
    match first_break {
        None => out.add_pass(format!("'{}' is strictly {}", var.name, word)),
        Some((i, p, v)) => out.add_failure(format!(
            "'{}' is not strictly {}: {} follows {} at {}",
            var.name,
            word,
            v,
            p,
            unravel(i, &var.shape)
        )),
    }
    Ok(())
}

// --- FILENAME TIME RANGE ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Stamp {
    date: CalendarDate,
    precision: Precision,
}

impl Stamp {
    fn parse(token: &str) -> Option<Self> {
        if !token.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let field = |range: std::ops::Range<usize>| token.get(range)?.parse::<u32>().ok();
        let precision = match token.len() {
            4 => Precision::Year,
            6 => Precision::Month,
            8 => Precision::Day,
            10 => Precision::Hour,
            12 => Precision::Minute,
            14 => Precision::Second,
            _ => return None,
        };
        let year = token.get(0..4)?.parse::<i32>().ok()?;
        let month = if precision >= Precision::Month { field(4..6)? } else { 1 };
        let day = if precision >= Precision::Day { field(6..8)? } else { 1 };
        let hour = if precision >= Precision::Hour { field(8..10)? } else { 0 };
        let minute = if precision >= Precision::Minute { field(10..12)? } else { 0 };
        let second = if precision >= Precision::Second { field(12..14)? } else { 0 };
        Some(Self {
            date: CalendarDate::new(year, month, day)
                .with_time(hour, minute)
                .with_second(second),
            precision,
        })
    }

    /// True when `date` agrees with this stamp at the stamp's precision.
    fn matches(&self, date: &CalendarDate) -> bool {
        let a = truncate(&self.date, self.precision);
        let b = truncate(date, self.precision);
        a == b
    }
}

fn truncate(d: &CalendarDate, p: Precision) -> (i32, u32, u32, u32, u32, u32) {
    (
        d.year,
        if p >= Precision::Month { d.month } else { 0 },
        if p >= Precision::Day { d.day } else { 0 },
        if p >= Precision::Hour { d.hour } else { 0 },
        if p >= Precision::Minute { d.minute } else { 0 },
        if p >= Precision::Second { d.second } else { 0 },
    )
}

fn parse_time_range(token: &str) -> Option<(Stamp, Stamp)> {
    let token = token.strip_suffix("-clim").unwrap_or(token);
    let (start, end) = token.split_once('-')?;
    let start = Stamp::parse(start)?;
    let end = Stamp::parse(end)?;
    (start.precision == end.precision).then_some((start, end))
}

fn filename_range(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let tokens = match ctx.resolver.parse_filename(ctx.dataset.file_name()) {
        Ok(t) => t,
        Err(e) => {
            out.note(format!("time range not compared: {}", e));
            return Ok(());
        }
    };
    let Some(raw) = tokens.get("time_range") else {
        out.note("filename carries no time range");
        return Ok(());
    };
    let Some((start, end)) = parse_time_range(raw) else {
        out.add_failure(format!("Invalid time range token '{}'", raw));
        return Ok(());
    };

    let dates = ctx.dataset.decode_time(&var.name)?;
    let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
        out.add_failure(format!("'{}' has no time steps", var.name));
        return Ok(());
    };

    for (label, stamp, actual) in [("start", start, first), ("end", end, last)] {
        if stamp.matches(actual) {
            out.add_pass(format!("time axis {} matches filename ({})", label, actual));
        } else {
            out.add_failure(format!(
                "time axis {}: expected {} from filename '{}', found {}",
                label, stamp.date, raw, actual
            ));
        }
    }
    Ok(())
}

// --- BOUNDS CONTINUITY ---

/// Visits each `(lower, upper)` row of an (N, 2) bounds variable in order.
fn for_each_interval<F>(
    ctx: &CheckContext<'_>,
    bounds: &VariableInfo,
    mut visit: F,
) -> Result<(), DatasetError>
where
    F: FnMut(usize, f64, f64),
{
    let mut lower = f64::NAN;
    ctx.for_each_value(bounds, |i, v| {
        if i % 2 == 0 {
            lower = v;
        } else {
            visit(i / 2, lower, v);
        }
    })
}

/// Same tolerance as numpy's `isclose` defaults.
fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

fn contiguity(
    ctx: &CheckContext<'_>,
    bounds: &VariableInfo,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let limit = ctx.max_reported();
    let mut previous_upper: Option<f64> = None;
    let mut breaks = 0usize;
    let mut examples = Vec::new();
    for_each_interval(ctx, bounds, |i, lower, upper| {
        if let Some(prev) = previous_upper {
            if !close(prev, lower) {
                breaks += 1;
                if examples.len() < limit {
                    let kind = if lower > prev { "gap" } else { "overlap" };
                    examples.push(format!(
                        "{} between {} and {} ({} vs {})",
                        kind,
                        i - 1,
                        i,
                        prev,
                        lower
                    ));
                }
            }
        }
        previous_upper = Some(upper);
    })?;

    if breaks == 0 {
        out.add_pass(format!("'{}' intervals are contiguous", bounds.name));
    } else {
        out.add_failure(format!(
            "'{}' has {} discontinuit{}, first: {}",
            bounds.name,
            breaks,
            if breaks == 1 { "y" } else { "ies" },
            examples.join("; ")
        ));
    }
    Ok(())
}

/// NaN counts as a decrease.
fn decreases(previous: f64, next: f64) -> bool {
    !matches!(
        next.partial_cmp(&previous),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

fn bounds_monotonic(
    ctx: &CheckContext<'_>,
    bounds: &VariableInfo,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let mut previous: Option<(f64, f64)> = None;
    let mut first_break: Option<(usize, &'static str)> = None;
    for_each_interval(ctx, bounds, |i, lower, upper| {
        if let (Some((prev_lower, prev_upper)), None) = (previous, first_break) {
            if decreases(prev_lower, lower) {
                first_break = Some((i, "lower"));
            } else if decreases(prev_upper, upper) {
                first_break = Some((i, "upper"));
            }
        }
        previous = Some((lower, upper));
    })?;

    match first_break {
        None => out.add_pass(format!("'{}' bounds never decrease", bounds.name)),
        Some((i, side)) => out.add_failure(format!(
            "'{}' is not monotonic: {} bound decreases at interval {}",
            bounds.name, side, i
        )),
    }
    Ok(())
}

// --- TIME SQUARENESS ---

struct SquarenessPolicy<'a> {
    calendar: Option<&'a str>,
    ref_time_units: Option<&'a str>,
    increments: BTreeMap<String, String>,
    midpoint_frequencies: &'a [String],
}

/// Whole-microsecond truncation used for comparing time offsets.
fn truncate_offset(value: f64) -> f64 {
    (value * 1e6).trunc() / 1e6
}

/// The variable the file is about: `variable_id` when it names a variable,
/// otherwise the first one laid out along the time axis.
fn target_variable(
    ctx: &CheckContext<'_>,
    time: &VariableInfo,
) -> Result<Option<VariableInfo>, DatasetError> {
    if let Some(id) = ctx.global_attribute("variable_id")? {
        if let Some(var) = ctx.variable(&id.as_text())? {
            return Ok(Some(var));
        }
    }
    let bounds = bounds_attribute(time);
    for name in ctx.dataset.variable_names()? {
        if name == time.name || Some(&name) == bounds.as_ref() {
            continue;
        }
        if let Some(var) = ctx.variable(&name)? {
            if var.dimensions.iter().any(|d| *d == time.name) {
                return Ok(Some(var));
            }
        }
    }
    Ok(None)
}

fn squareness(
    ctx: &CheckContext<'_>,
    var: &VariableInfo,
    policy: &SquarenessPolicy<'_>,
    out: &mut OutcomeBuilder,
) -> Result<(), DatasetError> {
    let units = var.attribute("units").map(|v| v.as_text()).unwrap_or_default();
    let calendar_name = var
        .attribute("calendar")
        .map(|v| v.as_text())
        .unwrap_or_else(|| calendar::DEFAULT_CALENDAR.to_string());

    if let Some(expected) = policy.calendar {
        out.record(
            calendar_name == expected,
            format!("'{}' calendar is '{}' (expected '{}')", var.name, calendar_name, expected),
        );
    }
    if let Some(expected) = policy.ref_time_units {
        out.record(
            units.trim() == expected.trim(),
            format!("'{}' units are '{}' (expected '{}')", var.name, units, expected),
        );
    }
    if units.is_empty() {
        out.add_failure(format!(
            "'{}' has no units; cannot rebuild the theoretical axis",
            var.name
        ));
        return Ok(());
    }

    let Some(frequency) = ctx.global_attribute("frequency")? else {
        out.note("no 'frequency' attribute; cannot resolve the expected step");
        return Ok(());
    };
    let frequency = frequency.as_text();
    let Some(token) = policy.increments.get(&frequency) else {
        out.note(format!("no time step known for frequency '{}'", frequency));
        return Ok(());
    };
    let step = match Step::parse(token) {
        Ok(step) => step,
        Err(e) => {
            out.add_failure(format!("frequency '{}': {}", frequency, e));
            return Ok(());
        }
    };

    let start = match ctx.resolver.parse_filename(ctx.dataset.file_name()) {
        Ok(tokens) => tokens
            .get("time_range")
            .and_then(parse_time_range)
            .map(|(start, _)| start.date),
        Err(_) => None,
    };
    let Some(start) = start else {
        out.add_failure(format!(
            "cannot read the time range start from '{}'",
            ctx.dataset.file_name()
        ));
        return Ok(());
    };

    let (calendar, time_units) = match (Calendar::parse(&calendar_name), TimeUnits::parse(&units)) {
        (Ok(c), Ok(u)) => (c, u),
        (Err(e), _) | (_, Err(e)) => {
            out.add_failure(format!("'{}': {}", var.name, e));
            return Ok(());
        }
    };

    let count = var.element_count();
    if count == 0 {
        out.add_failure(format!("'{}' is empty", var.name));
        return Ok(());
    }

    let instantaneous = match target_variable(ctx, var)? {
        Some(target) => target
            .attribute("cell_methods")
            .map(|v| v.as_text().to_lowercase().contains("time: point"))
            .unwrap_or(false),
        None => false,
    };
    let midpoint = !instantaneous && policy.midpoint_frequencies.contains(&frequency);

    let expected = match theoretical_axis(&start, step, calendar, &time_units, midpoint, count) {
        Ok(axis) => axis,
        Err(e) => {
            out.add_failure(format!("cannot build the theoretical '{}' axis: {}", var.name, e));
            return Ok(());
        }
    };

    let mut mismatch: Option<(usize, f64, f64)> = None;
    ctx.for_each_value(var, |i, v| {
        if mismatch.is_some() {
            return;
        }
        let want = expected.get(i).copied().map(truncate_offset);
        let got = truncate_offset(v);
        if let Some(want) = want {
            if want != got {
                mismatch = Some((i, want, got));
            }
        }
    })?;

    match mismatch {
        None => out.add_pass(format!(
            "'{}' follows a {} axis from {} (midpoint: {})",
            var.name, step, start, midpoint
        )),
        Some((i, want, got)) => out.add_failure(format!(
            "'{}' mismatch at index {}: expected {:.6}, got {:.6} (frequency {}, midpoint: {})",
            var.name, i, want, got, frequency, midpoint
        )),
    }
    Ok(())
}

/// Offsets, in the file's units, that a square axis of `count` steps holds.
fn theoretical_axis(
    start: &CalendarDate,
    step: Step,
    calendar: Calendar,
    units: &TimeUnits,
    midpoint: bool,
    count: usize,
) -> Result<Vec<f64>, String> {
    if step.unit.is_fixed() {
        let n0 = calendar::encode(start, units, calendar)?;
        let n1 = calendar::encode(&calendar.add(start, step)?, units, calendar)?;
        let width = n1 - n0;
        let first = if midpoint { (n0 + n1) / 2.0 } else { n0 };
        return Ok((0..count).map(|i| first + i as f64 * width).collect());
    }

    let mut axis = Vec::with_capacity(count);
    let mut current = *start;
    for _ in 0..count {
        let next = calendar.add(&current, step)?;
        let n0 = calendar::encode(&current, units, calendar)?;
        axis.push(if midpoint {
            (n0 + calendar::encode(&next, units, calendar)?) / 2.0
        } else {
            n0
        });
        current = next;
    }
    Ok(axis)
}
