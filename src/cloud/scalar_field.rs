//! Per-point scalar attributes

/// Sentinel stored for points that never received a value for a field.
pub const MISSING_VALUE: f64 = f64::NAN;

/// A named, per-point numeric attribute parallel to the cloud positions.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    name: String,
    values: Vec<f64>,
    /// Running (min, max) over non-sentinel values
    range: Option<(f64, f64)>,
}

impl ScalarField {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), values: Vec::new(), range: None }
    }

    /// Create a field back-filled with the sentinel for `len` existing points.
    pub fn filled(name: impl Into<String>, len: usize) -> Self {
        Self { name: name.into(), values: vec![MISSING_VALUE; len], range: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn min(&self) -> Option<f64> {
        self.range.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<f64> {
        self.range.map(|(_, max)| max)
    }

    /// Number of points holding the sentinel.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
    }

    /// Append a value and update the running range.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
        self.widen(value);
    }

    /// Pad with the sentinel up to `len` values.
    pub fn pad_to(&mut self, len: usize) {
        if self.values.len() < len {
            self.values.resize(len, MISSING_VALUE);
        }
    }

    /// Overwrite one value. Out-of-range indices are ignored.
    ///
    /// The range only widens; call `compute_min_and_max` after replacing
    /// values that were already set.
    pub fn set(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
            self.widen(value);
        }
    }

    /// Recompute the range from scratch.
    pub fn compute_min_and_max(&mut self) {
        self.range = None;
        for i in 0..self.values.len() {
            let v = self.values[i];
            self.widen(v);
        }
    }

    fn widen(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.range = Some(match self.range {
            None => (value, value),
            Some((min, max)) => (min.min(value), max.max(value)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_range_skips_sentinel() {
        let mut sf = ScalarField::filled("Intensity", 2);
        assert_eq!(sf.min(), None);
        sf.push(4.0);
        sf.push(-1.0);
        sf.push(MISSING_VALUE);
        assert_eq!(sf.len(), 5);
        assert_eq!(sf.min(), Some(-1.0));
        assert_eq!(sf.max(), Some(4.0));
        assert_eq!(sf.missing_count(), 3);
    }

    #[test]
    fn test_set_and_recompute() {
        let mut sf = ScalarField::filled("Classification", 3);
        sf.set(1, 2.0);
        sf.set(10, 99.0);
        assert_eq!(sf.get(1), Some(2.0));
        assert_eq!(sf.max(), Some(2.0));

        sf.compute_min_and_max();
        assert_eq!(sf.min(), Some(2.0));
    }
}
