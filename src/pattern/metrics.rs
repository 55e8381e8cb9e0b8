//! Mapping balance metrics of a pattern instance, derived purely from the
//! pattern's block queries. Used by tests and distribution tuning.

use crate::pattern::Pattern;

pub struct PatternMetrics {
    unit_blocks: Vec<usize>,
    unit_elements: Vec<usize>,
    num_blocks: usize,
    min_blocks: usize,
    max_blocks: usize,
    num_balanced_units: usize,
    num_imbalanced_units: usize,
    imbalance_factor: f64,
}

impl PatternMetrics {
    pub fn new<const R: usize>(pattern: &Pattern<R>) -> PatternMetrics {
        let nunits = pattern.num_units();
        let mut unit_blocks = vec![0usize; nunits];
        let num_blocks: usize = pattern.blockspec().iter().product();
        for bi in 0..num_blocks {
            let block = pattern.block(bi);
            let unit = pattern.unit_at(&block.offsets());
            unit_blocks[unit] += 1;
        }
        let unit_elements: Vec<usize> = (0..nunits).map(|u| pattern.local_size(u)).collect();
        let min_blocks = unit_blocks.iter().copied().min().unwrap_or(0);
        let max_blocks = unit_blocks.iter().copied().max().unwrap_or(0);
        let num_balanced_units = unit_blocks.iter().filter(|b| **b == min_blocks).count();
        let num_imbalanced_units = if min_blocks == max_blocks {
            0
        } else {
            unit_blocks.iter().filter(|b| **b == max_blocks).count()
        };
        let min_elements = unit_elements.iter().copied().min().unwrap_or(0);
        let max_elements = unit_elements.iter().copied().max().unwrap_or(0);
        let imbalance_factor = if min_elements == 0 {
            // some unit holds nothing; the mapping is unboundedly skewed
            f64::INFINITY
        } else {
            max_elements as f64 / min_elements as f64
        };
        PatternMetrics {
            unit_blocks,
            unit_elements,
            num_blocks,
            min_blocks,
            max_blocks,
            num_balanced_units,
            num_imbalanced_units,
            imbalance_factor,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Relation of (max elements per unit) / (min elements per unit);
    /// 1.0 indicates perfect balance.
    pub fn imbalance_factor(&self) -> f64 {
        self.imbalance_factor
    }

    /// Minimum number of blocks mapped to any unit.
    pub fn min_blocks_per_unit(&self) -> usize {
        self.min_blocks
    }

    /// Maximum number of blocks mapped to any unit.
    pub fn max_blocks_per_unit(&self) -> usize {
        self.max_blocks
    }

    /// Minimum number of elements mapped to any unit.
    pub fn min_elements_per_unit(&self) -> usize {
        self.unit_elements.iter().copied().min().unwrap_or(0)
    }

    /// Maximum number of elements mapped to any unit.
    pub fn max_elements_per_unit(&self) -> usize {
        self.unit_elements.iter().copied().max().unwrap_or(0)
    }

    /// Number of units mapped to the minimum number of blocks.
    pub fn num_balanced_units(&self) -> usize {
        self.num_balanced_units
    }

    /// Number of units mapped to the maximum number of blocks.
    pub fn num_imbalanced_units(&self) -> usize {
        self.num_imbalanced_units
    }

    /// Number of blocks mapped to the given unit.
    pub fn unit_local_blocks(&self, unit: usize) -> usize {
        self.unit_blocks[unit]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Dist, TeamSpec};

    #[test]
    fn balanced_blocked_pattern() {
        let dist = [Dist::None, Dist::Blocked];
        let pat = Pattern::new([8, 6], dist, TeamSpec::balanced(&dist, 2));
        let m = PatternMetrics::new(&pat);
        assert_eq!(m.num_blocks(), 2);
        assert_eq!(m.min_blocks_per_unit(), 1);
        assert_eq!(m.max_blocks_per_unit(), 1);
        assert_eq!(m.num_balanced_units(), 2);
        assert_eq!(m.num_imbalanced_units(), 0);
        assert_eq!(m.imbalance_factor(), 1.0);
    }

    #[test]
    fn uneven_blockcyclic_pattern() {
        // 4 units, 5 blocks of 2 over 10 elements: one unit carries 2 blocks
        let dist = [Dist::BlockCyclic(2)];
        let pat = Pattern::new([10], dist, TeamSpec::new([4]));
        let m = PatternMetrics::new(&pat);
        assert_eq!(m.num_blocks(), 5);
        assert_eq!(m.min_blocks_per_unit(), 1);
        assert_eq!(m.max_blocks_per_unit(), 2);
        assert_eq!(m.num_imbalanced_units(), 1);
        assert_eq!(m.unit_local_blocks(0), 2);
        assert_eq!(m.max_elements_per_unit(), 4);
        assert_eq!(m.min_elements_per_unit(), 2);
        assert_eq!(m.imbalance_factor(), 2.0);
    }

    #[test]
    fn empty_unit_is_infinitely_imbalanced() {
        // 3 elements over 4 units: one unit holds nothing
        let dist = [Dist::Blocked];
        let pat = Pattern::new([3], dist, TeamSpec::new([4]));
        let m = PatternMetrics::new(&pat);
        assert!(m.imbalance_factor().is_infinite());
    }
}
