/// Tuning for a [`BatchLoader`](crate::BatchLoader).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Largest number of ids sent in one request. `None` (or zero) sends
    /// every id collected in a turn together.
    pub max_batch_size: Option<usize>,
}

impl LoaderConfig {
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub(crate) fn chunk_len(&self, total: usize) -> usize {
        match self.max_batch_size {
            Some(size) if size > 0 => size,
            _ => total.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_len_defaults_to_everything() {
        assert_eq!(LoaderConfig::default().chunk_len(7), 7);
        assert_eq!(LoaderConfig::default().chunk_len(0), 1);
        assert_eq!(LoaderConfig::default().max_batch_size(3).chunk_len(7), 3);
        assert_eq!(LoaderConfig::default().max_batch_size(0).chunk_len(7), 7);
    }
}
