//! Configuration options for combining partial normal equations.

/// How a list of partial normal equations is folded into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceStrategy {
    /// Merge every input into the first one, left to right
    Sequential,

    /// Merge neighbouring pairs, then pairs of pairs, until one remains.
    /// The tree only depends on the number of inputs.
    PairwiseTree,
}

impl Default for ReduceStrategy {
    fn default() -> Self {
        ReduceStrategy::PairwiseTree
    }
}

/// Configuration options for reductions.
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    /// Shape of the reduction. Default: PairwiseTree
    pub strategy: ReduceStrategy,

    /// Whether independent merges and decodes may run on the rayon thread pool.
    /// Has no effect without the `parallel` feature. Default: true
    pub parallel: bool,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            strategy: ReduceStrategy::default(),
            parallel: true,
        }
    }
}

impl ReduceConfig {
    /// Create a configuration with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reduction strategy.
    pub fn with_strategy(mut self, strategy: ReduceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set whether the reduction may run in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
