use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/*
Quantized Parameters
====================

Every knob on the instrument is a `Parameter`: a continuous range [min, max]
cut into N discrete steps. The N values are computed once, at construction,
so reading a parameter on the audio thread is an atomic load plus a table
lookup.

  index     0     1     2    ...   N-2    N-1
  value    min   v1    v2    ...  vN-2    max

Endpoints are always exact: index 0 is `min`, index N-1 is `max`, and the
table never decreases in between.


Scales
------

  linear       v[i] = min + i * (max - min) / N

  exponential  v[i] = log2(2^min + i * (2^max - 2^min) / N)
               Compressed at the low end, dense near the top.

  logarithmic  v[i] = 2^(log2(min) + i * (log2(max) - log2(min)) / N)
               Dense near the bottom, the natural scale for frequencies.
               log2(0) does not exist, so a zero minimum needs an anchor:
               v[0] = 0, v[1] = anchor, and the N-1 remaining slots spread
               over [log2(anchor), log2(max)].

Each entry is evaluated in closed form from its index. Nothing accumulates,
so the table does not drift for large N.


Sharing
-------

A `Parameter` is a handle. Cloning it hands out another view of the same
live index, which is how the broker (writer) and the engine modules
(readers) stay in sync without any registry lookups on the audio thread.

  ingestion thread                    audio thread
  ----------------                    ------------
  apply_delta(+3) ──► AtomicI32 ◄──── current_value()
                         │
                         └──► listeners (called on the ingestion thread)

Index updates are a compare-and-swap loop with clamping, so concurrent
deltas never leave [0, N-1].
*/

/// Distribution of the precomputed values across the parameter range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Exponential,
    Logarithmic,
}

/// Default discretization count, one step per MIDI data value.
pub const DEFAULT_STEPS: usize = 128;

type Listener = Box<dyn Fn(&Parameter) + Send + Sync>;

struct ParamCell {
    values: Box<[f32]>,
    index: AtomicI32,
    generation: AtomicU64,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    cell: Weak<ParamCell>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Thread-safe handle to a quantized, precomputed parameter.
///
/// `Parameter::default()` is an invalid handle: every accessor answers a
/// sentinel instead of panicking, so a missed binding degrades to silence
/// rather than a crash on the audio thread.
#[derive(Clone, Default)]
pub struct Parameter {
    cell: Option<Arc<ParamCell>>,
}

impl Parameter {
    /// Build a parameter without a logarithmic anchor.
    pub fn new(init: f32, min: f32, max: f32, scale: Scale, steps: usize) -> Self {
        Self::with_anchor(init, min, max, scale, steps, None)
    }

    /// Linear parameter with the default resolution.
    pub fn linear(init: f32, min: f32, max: f32) -> Self {
        Self::new(init, min, max, Scale::Linear, DEFAULT_STEPS)
    }

    /// Build a parameter. `anchor` is the first non-zero value of a
    /// logarithmic table whose minimum is zero; it is ignored otherwise.
    pub fn with_anchor(
        init: f32,
        min: f32,
        max: f32,
        scale: Scale,
        steps: usize,
        anchor: Option<f32>,
    ) -> Self {
        let min = if min.is_finite() { min } else { 0.0 };
        let max = if max.is_finite() { max } else { min };
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let steps = steps.max(2);

        let values = match scale {
            Scale::Linear => linear_table(min, max, steps),
            Scale::Exponential => exp_table(min, max, steps),
            // No logarithm below or at zero
            Scale::Logarithmic if min < 0.0 || max <= 0.0 => linear_table(min, max, steps),
            Scale::Logarithmic => log_table(min, max, steps, anchor),
        };

        let init = if (min..=max).contains(&init) { init } else { min };
        let index = initial_index(&values, init);

        Self {
            cell: Some(Arc::new(ParamCell {
                values: values.into_boxed_slice(),
                index: AtomicI32::new(index as i32),
                generation: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            })),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.cell.is_some()
    }

    /// Current value, or -1.0 for an invalid handle.
    #[inline]
    pub fn current_value(&self) -> f32 {
        match &self.cell {
            Some(cell) => cell.values[cell.index.load(Ordering::Relaxed) as usize],
            None => -1.0,
        }
    }

    /// Current discrete index, or -1 for an invalid handle.
    #[inline]
    pub fn current_index(&self) -> i32 {
        match &self.cell {
            Some(cell) => cell.index.load(Ordering::Relaxed),
            None => -1,
        }
    }

    /// Discretization count N, or 0 for an invalid handle.
    pub fn steps(&self) -> usize {
        self.cell.as_ref().map_or(0, |cell| cell.values.len())
    }

    /// Position of the current index in [0, 1].
    #[inline]
    pub fn unscaled_ratio(&self) -> f32 {
        match &self.cell {
            Some(cell) => {
                let last = cell.values.len() - 1;
                cell.index.load(Ordering::Relaxed) as f32 / last as f32
            }
            None => 0.0,
        }
    }

    /// Table entry at `round(ratio * (N - 1))`.
    ///
    /// The ratio is clamped to [0, 1] (NaN reads as 0). Invalid handles
    /// answer -1.0.
    #[inline]
    pub fn value_for_ratio(&self, ratio: f32) -> f32 {
        match &self.cell {
            Some(cell) => {
                let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
                let last = cell.values.len() - 1;
                let index = (ratio * last as f32).round() as usize;
                cell.values[index.min(last)]
            }
            None => -1.0,
        }
    }

    /// Move the index by `delta` steps, saturating at both ends.
    pub fn apply_delta(&self, delta: i32) {
        let Some(cell) = &self.cell else {
            return;
        };
        if delta == 0 {
            return;
        }

        let last = cell.values.len() as i32 - 1;
        let previous = cell
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| {
                let next = index.saturating_add(delta).clamp(0, last);
                (next != index).then_some(next)
            });

        if previous.is_ok() {
            self.notify(cell);
        }
    }

    /// Jump to an absolute index, clamped to [0, N-1].
    pub fn set_index(&self, index: i32) {
        let Some(cell) = &self.cell else {
            return;
        };

        let target = index.clamp(0, cell.values.len() as i32 - 1);
        let previous = cell.index.swap(target, Ordering::AcqRel);

        if previous != target {
            self.notify(cell);
        }
    }

    /// Register an observer called after every index change.
    ///
    /// Observers run synchronously on the mutating thread and must not
    /// block or subscribe to the same parameter. The listener stays
    /// registered for as long as the returned [`Subscription`] lives.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Parameter) + Send + Sync + 'static,
    {
        let Some(cell) = &self.cell else {
            return Subscription {
                cell: Weak::new(),
                id: 0,
            };
        };

        let id = cell.next_listener.fetch_add(1, Ordering::Relaxed);
        cell.listeners.write().push((id, Box::new(listener)));
        Subscription {
            cell: Arc::downgrade(cell),
            id,
        }
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.cell
            .as_ref()
            .map_or(0, |cell| cell.listeners.read().len())
    }

    /// Number of index changes seen so far. Lets consumers poll instead
    /// of subscribing.
    pub fn generation(&self) -> u64 {
        self.cell
            .as_ref()
            .map_or(0, |cell| cell.generation.load(Ordering::Acquire))
    }

    /// True when both handles view the same underlying cell.
    pub fn same_as(&self, other: &Parameter) -> bool {
        match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn notify(&self, cell: &ParamCell) {
        cell.generation.fetch_add(1, Ordering::AcqRel);
        for (_, listener) in cell.listeners.read().iter() {
            listener(self);
        }
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            Some(cell) => f
                .debug_struct("Parameter")
                .field("index", &self.current_index())
                .field("value", &self.current_value())
                .field("steps", &cell.values.len())
                .finish(),
            None => f.write_str("Parameter(invalid)"),
        }
    }
}

fn linear_table(min: f32, max: f32, steps: usize) -> Vec<f32> {
    let step = (f64::from(max) - f64::from(min)) / steps as f64;
    fill_table(min, max, steps, |i| (f64::from(min) + i as f64 * step) as f32)
}

fn exp_table(min: f32, max: f32, steps: usize) -> Vec<f32> {
    let lower = 2f64.powf(f64::from(min));
    let upper = 2f64.powf(f64::from(max));
    let step = (upper - lower) / steps as f64;
    fill_table(min, max, steps, |i| (lower + i as f64 * step).log2() as f32)
}

fn log_table(min: f32, max: f32, steps: usize, anchor: Option<f32>) -> Vec<f32> {
    let upper = f64::from(max).log2();

    if min > 0.0 {
        let lower = f64::from(min).log2();
        let step = (upper - lower) / steps as f64;
        return fill_table(min, max, steps, |i| {
            2f64.powf(lower + i as f64 * step) as f32
        });
    }

    // Zero minimum: slot 1 holds the anchor, the rest spreads above it.
    let anchor = anchor
        .filter(|a| *a > 0.0 && *a < max)
        .unwrap_or(max / steps as f32);
    let lower = f64::from(anchor).log2();
    let step = (upper - lower) / (steps - 1) as f64;
    fill_table(min, max, steps, |i| {
        2f64.powf(lower + (i - 1) as f64 * step) as f32
    })
}

fn fill_table(min: f32, max: f32, steps: usize, interior: impl Fn(usize) -> f32) -> Vec<f32> {
    let mut values = vec![min; steps];
    for (i, value) in values.iter_mut().enumerate().take(steps - 1).skip(1) {
        *value = interior(i).clamp(min, max);
    }
    values[steps - 1] = max;
    values
}

fn initial_index(values: &[f32], init: f32) -> usize {
    let last = values.len() - 1;
    if init == values[last] {
        return last;
    }
    values
        .iter()
        .take(last)
        .filter(|v| **v <= init)
        .count()
        .saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    const SCALES: [Scale; 3] = [Scale::Linear, Scale::Exponential, Scale::Logarithmic];

    #[test]
    fn endpoints_are_exact_for_every_scale() {
        for scale in SCALES {
            let param = Parameter::new(1.0, 0.01, 2.0, scale, 128);
            assert_eq!(param.value_for_ratio(0.0), 0.01, "{scale:?}");
            assert_eq!(param.value_for_ratio(1.0), 2.0, "{scale:?}");

            param.set_index(0);
            assert_eq!(param.current_value(), 0.01);
            param.set_index(127);
            assert_eq!(param.current_value(), 2.0);
        }
    }

    #[test]
    fn tables_never_decrease() {
        for scale in SCALES {
            let param = Parameter::new(1.0, 0.05, 12.0, scale, 430);
            let mut previous = f32::MIN;
            for i in 0..param.steps() {
                let value = param.value_for_ratio(i as f32 / (param.steps() - 1) as f32);
                assert!(value >= previous, "{scale:?} decreased at {i}");
                previous = value;
            }
        }
    }

    #[test]
    fn linear_walkthrough_saturates_at_zero() {
        let param = Parameter::new(1.0, 0.0, 2.0, Scale::Linear, 128);
        assert!((param.current_value() - 1.0).abs() <= 2.0 / 128.0);

        param.apply_delta(-64);
        assert_eq!(param.current_value(), 0.0);

        param.apply_delta(-1);
        assert_eq!(param.current_value(), 0.0);
        assert_eq!(param.current_index(), 0);
    }

    #[test]
    fn large_deltas_saturate_idempotently() {
        let param = Parameter::linear(0.5, 0.0, 1.0);
        for _ in 0..3 {
            param.apply_delta(i32::MAX);
            assert_eq!(param.current_index(), 127);
        }
        for _ in 0..3 {
            param.apply_delta(i32::MIN);
            assert_eq!(param.current_index(), 0);
        }
    }

    #[test]
    fn logarithmic_steps_widen_towards_the_top() {
        let param = Parameter::new(1.0, 0.01, 2.0, Scale::Logarithmic, 128);
        let (a, b, c) = (0.3, 0.45, 0.6);
        let low = param.value_for_ratio(b) - param.value_for_ratio(a);
        let high = param.value_for_ratio(c) - param.value_for_ratio(b);
        assert!(high > low * 1.01);
    }

    #[test]
    fn logarithmic_zero_minimum_uses_anchor() {
        let param = Parameter::with_anchor(0.0, 0.0, 1000.0, Scale::Logarithmic, 64, Some(5.0));
        assert_eq!(param.value_for_ratio(0.0), 0.0);
        assert!((param.value_for_ratio(1.0 / 63.0) - 5.0).abs() < 1e-3);
        assert_eq!(param.value_for_ratio(1.0), 1000.0);
        assert!(param.value_for_ratio(0.5).is_finite());
    }

    #[test]
    fn out_of_range_init_falls_back_to_minimum() {
        let param = Parameter::linear(42.0, 0.0, 1.0);
        assert_eq!(param.current_index(), 0);
        assert_eq!(param.current_value(), 0.0);
    }

    #[test]
    fn init_at_maximum_maps_to_last_index() {
        let param = Parameter::linear(1.0, 0.0, 1.0);
        assert_eq!(param.current_index(), 127);
    }

    #[test]
    fn ratio_round_trips_the_current_value() {
        let param = Parameter::linear(1.0, 0.0, 2.0);
        let ratio = param.unscaled_ratio();
        assert_eq!(param.current_value(), param.value_for_ratio(ratio));
    }

    #[test]
    fn invalid_handle_answers_sentinels() {
        let param = Parameter::default();
        assert!(!param.is_valid());
        assert_eq!(param.current_value(), -1.0);
        assert_eq!(param.current_index(), -1);
        assert_eq!(param.unscaled_ratio(), 0.0);
        assert_eq!(param.value_for_ratio(0.5), -1.0);
        assert_eq!(param.steps(), 0);
        param.apply_delta(3);
        param.set_index(3);
        assert_eq!(param.current_index(), -1);
    }

    #[test]
    fn clones_share_live_state_and_identity() {
        let a = Parameter::linear(1.0, 0.0, 2.0);
        let b = Parameter::linear(1.0, 0.0, 2.0);
        let a_copy = a.clone();

        a.apply_delta(-5);
        assert_eq!(a.current_index(), a_copy.current_index());
        assert_ne!(b.current_index(), a_copy.current_index());
        assert_eq!(a, a_copy);
        assert_ne!(a, b);
    }

    #[test]
    fn listeners_fire_only_on_real_changes() {
        let param = Parameter::linear(0.0, 0.0, 1.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = param.clone();
        let counter = calls.clone();
        let _subscription = param.subscribe(move |source| {
            assert!(source.same_as(&seen));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        param.apply_delta(-1); // already at 0
        param.apply_delta(2);
        param.set_index(2); // unchanged
        param.set_index(10);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(param.generation(), 2);
    }

    #[test]
    fn dropping_the_subscription_unregisters() {
        let param = Parameter::linear(0.0, 0.0, 1.0);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let subscription = param.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _other = param.subscribe(|_| {});
        param.apply_delta(1);
        assert_eq!(param.listener_count(), 2);

        drop(subscription);
        param.apply_delta(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(param.listener_count(), 1);
    }

    #[test]
    fn subscription_outliving_the_parameter_is_harmless() {
        let subscription = Parameter::linear(0.0, 0.0, 1.0).subscribe(|_| {});
        drop(subscription);

        let invalid = Parameter::default().subscribe(|_| {});
        drop(invalid);
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let param = Parameter::linear(0.5, 1.0, 0.0);
        assert_eq!(param.value_for_ratio(0.0), 0.0);
        assert_eq!(param.value_for_ratio(1.0), 1.0);
    }

    #[test]
    fn too_few_steps_are_promoted_to_two() {
        for steps in [0, 1] {
            let param = Parameter::new(0.0, 0.0, 1.0, Scale::Linear, steps);
            assert_eq!(param.steps(), 2);
            param.apply_delta(1);
            assert_eq!(param.current_value(), 1.0);
        }
    }

    #[test]
    fn logarithmic_with_negative_minimum_spaces_linearly() {
        let log = Parameter::new(0.0, -1.0, 1.0, Scale::Logarithmic, 5);
        let linear = Parameter::new(0.0, -1.0, 1.0, Scale::Linear, 5);
        for i in 0..5 {
            let ratio = i as f32 / 4.0;
            assert_eq!(log.value_for_ratio(ratio), linear.value_for_ratio(ratio));
        }
    }

    #[test]
    fn logarithmic_zero_minimum_without_anchor_starts_at_max_over_n() {
        let param = Parameter::new(0.0, 0.0, 1000.0, Scale::Logarithmic, 100);
        assert_eq!(param.value_for_ratio(0.0), 0.0);
        assert!((param.value_for_ratio(1.0 / 99.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn non_finite_or_degenerate_bounds_stay_finite() {
        let param = Parameter::new(0.5, f32::NAN, 1.0, Scale::Linear, 128);
        assert_eq!(param.value_for_ratio(0.0), 0.0);
        assert_eq!(param.value_for_ratio(1.0), 1.0);

        let param = Parameter::new(0.0, 0.0, f32::INFINITY, Scale::Exponential, 16);
        assert!(param.value_for_ratio(0.5).is_finite());

        let param = Parameter::new(0.0, 0.0, 0.0, Scale::Logarithmic, 128);
        assert_eq!(param.value_for_ratio(0.5), 0.0);
        assert_eq!(param.current_value(), 0.0);
    }

    #[test]
    fn concurrent_deltas_stay_in_range() {
        let param = Parameter::linear(1.0, 0.0, 2.0);
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let param = param.clone();
                thread::spawn(move || {
                    for i in 0..5_000 {
                        let delta = ((i * 7 + t * 3) % 21) as i32 - 10;
                        param.apply_delta(delta);
                    }
                })
            })
            .collect();

        for _ in 0..20_000 {
            let value = param.current_value();
            assert!((0.0..=2.0).contains(&value));
        }

        for writer in writers {
            writer.join().unwrap();
        }
        assert!((0..128).contains(&param.current_index()));
    }
}
