/// Weighted outcome table resolved from a single uniform draw.
///
/// Entries are `(cumulative_threshold, outcome)` pairs sorted by threshold.
/// A draw `d` in `[0, 1)` resolves to the first entry with `d <= threshold`;
/// draws past the last threshold resolve to the last entry.
#[derive(Debug, Clone)]
pub struct OutcomeTable<T: 'static> {
    entries: &'static [(f64, T)],
}

impl<T: Copy> OutcomeTable<T> {
    pub const fn new(entries: &'static [(f64, T)]) -> Self {
        assert!(!entries.is_empty(), "outcome table needs at least one entry");
        Self { entries }
    }

    pub fn resolve(&self, draw: f64) -> T {
        let last = self.entries[self.entries.len() - 1];
        self.entries
            .iter()
            .find(|(threshold, _)| draw <= *threshold)
            .map_or(last.1, |(_, outcome)| *outcome)
    }

    /// Probability mass assigned to each outcome, in table order.
    #[cfg(test)]
    pub(crate) fn weights(&self) -> Vec<(T, f64)> {
        let mut prev = 0.0;
        self.entries
            .iter()
            .map(|(threshold, outcome)| {
                let weight = threshold - prev;
                prev = *threshold;
                (*outcome, weight)
            })
            .collect()
    }
}
