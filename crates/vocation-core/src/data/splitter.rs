//! # Stratified train/validation/test splitting
//!
//! Partition totals are rounded from the requested fractions, then each
//! partition's total is apportioned over the classes so that every
//! class-by-partition count is the floor or the ceiling of its exact
//! proportional share. Members of each class are shuffled with the seed
//! before being dealt out, so the same seed always gives the same split.

use std::collections::{BTreeMap, VecDeque};

use oorandom::Rand64;
use serde::{Deserialize, Serialize};

use crate::data::shuffle;
use crate::error::{Result, VocationError};

const FRACTION_TOLERANCE: f64 = 1e-6;
const NUM_PARTITIONS: usize = 3;

/// Requested share of the dataset for each partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub valid: f64,
    pub test: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.7,
            valid: 0.15,
            test: 0.15,
        }
    }
}

impl SplitFractions {
    /// Validated fractions.
    pub fn new(train: f64, valid: f64, test: f64) -> Result<Self> {
        let fractions = Self { train, valid, test };
        fractions.validate()?;
        Ok(fractions)
    }

    /// Fractions expressed as absolute example counts out of `total`.
    pub fn from_counts(train: usize, valid: usize, test: usize, total: usize) -> Result<Self> {
        if total == 0 {
            return Err(VocationError::EmptyDataset("cannot split zero examples".into()));
        }
        let t = total as f64;
        Self::new(train as f64 / t, valid as f64 / t, test as f64 / t)
    }

    /// Checks every fraction is finite and non-negative and that they sum to 1.
    pub fn validate(&self) -> Result<()> {
        for f in [self.train, self.valid, self.test] {
            if !f.is_finite() || f < 0.0 {
                return Err(VocationError::InvalidFraction(f));
            }
        }
        let sum = self.train + self.valid + self.test;
        if (sum - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(VocationError::FractionMismatch {
                train: self.train,
                valid: self.valid,
                test: self.test,
                sum,
            });
        }
        Ok(())
    }

    /// Partition sizes for `n` examples. Validation takes the rounding remainder.
    #[must_use]
    pub fn totals(&self, n: usize) -> [usize; NUM_PARTITIONS] {
        let train = (((n as f64) * self.train).round() as usize).min(n);
        let test = (((n as f64) * self.test).round() as usize).min(n - train);
        [train, n - train - test, test]
    }
}

/// Per-partition class counts, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train: BTreeMap<String, usize>,
    pub valid: BTreeMap<String, usize>,
    pub test: BTreeMap<String, usize>,
}

impl SplitSummary {
    fn log(&self, sizes: [usize; NUM_PARTITIONS]) {
        tracing::info!(
            "train : validation : test = {} : {} : {}",
            sizes[0],
            sizes[1],
            sizes[2]
        );
        tracing::debug!("train classes: {:?}", self.train);
        tracing::debug!("validation classes: {:?}", self.valid);
        tracing::debug!("test classes: {:?}", self.test);
    }
}

/// Indices of each partition, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
    pub summary: SplitSummary,
}

impl Split {
    pub fn total(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }
}

/// Splits `labels` into stratified train/validation/test index sets.
pub fn stratified_split<S: AsRef<str>>(
    labels: &[S],
    fractions: SplitFractions,
    seed: u64,
) -> Result<Split> {
    fractions.validate()?;
    let n = labels.len();
    if n == 0 {
        return Err(VocationError::EmptyDataset("cannot split zero examples".into()));
    }

    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(label.as_ref()).or_default().push(i);
    }

    let totals = fractions.totals(n);
    let needed = totals.iter().filter(|&&t| t > 0).count();
    if let Some((label, members)) = by_class.iter().find(|(_, m)| m.len() < needed) {
        return Err(VocationError::StratificationInfeasible {
            label: (*label).to_string(),
            count: members.len(),
            needed,
        });
    }

    let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
    let alloc = apportion(&counts, totals, n);

    let mut rng = Rand64::new(u128::from(seed));
    let mut parts: [Vec<usize>; NUM_PARTITIONS] = Default::default();
    let mut summary = SplitSummary::default();

    for ((label, members), row) in by_class.into_iter().zip(&alloc) {
        let mut members = members;
        shuffle(&mut members, &mut rng);

        let mut rest = members.as_slice();
        for (p, &take) in row.iter().enumerate() {
            let (head, tail) = rest.split_at(take);
            parts[p].extend_from_slice(head);
            rest = tail;
        }

        for (p, counts) in [&mut summary.train, &mut summary.valid, &mut summary.test]
            .into_iter()
            .enumerate()
        {
            if row[p] > 0 {
                counts.insert(label.to_string(), row[p]);
            }
        }
    }

    for part in &mut parts {
        part.sort_unstable();
    }
    summary.log(totals);

    let [train, valid, test] = parts;
    Ok(Split {
        train,
        valid,
        test,
        summary,
    })
}

/// Rounds the class-by-partition share table `counts[c] * totals[p] / n`
/// so that rows sum to `counts` and columns sum to `totals`, with every
/// cell the floor or the ceiling of its exact share.
fn apportion(
    counts: &[usize],
    totals: [usize; NUM_PARTITIONS],
    n: usize,
) -> Vec<[usize; NUM_PARTITIONS]> {
    let mut alloc = vec![[0usize; NUM_PARTITIONS]; counts.len()];
    let mut frac = vec![[0f64; NUM_PARTITIONS]; counts.len()];
    let mut row_need = vec![0usize; counts.len()];
    let mut col_need = totals;

    for (c, &count) in counts.iter().enumerate() {
        for p in 0..NUM_PARTITIONS {
            // Exact integer floor; the fractional part only ranks candidates.
            let scaled = count * totals[p];
            alloc[c][p] = scaled / n;
            frac[c][p] = (scaled % n) as f64 / n as f64;
            col_need[p] -= alloc[c][p];
        }
        row_need[c] = count - alloc[c].iter().sum::<usize>();
    }

    // Cells that can still be rounded up. A class missing from a partition
    // goes first, then the largest fractional parts.
    let mut candidates: Vec<(usize, usize)> = (0..counts.len())
        .flat_map(|c| (0..NUM_PARTITIONS).map(move |p| (c, p)))
        .filter(|&(c, p)| frac[c][p] > 0.0)
        .collect();
    candidates.sort_by(|&(a, p), &(b, q)| {
        (alloc[b][q] == 0)
            .cmp(&(alloc[a][p] == 0))
            .then(frac[b][q].total_cmp(&frac[a][p]))
    });

    let mut raised = vec![[false; NUM_PARTITIONS]; counts.len()];
    for &(c, p) in &candidates {
        if row_need[c] > 0 && col_need[p] > 0 {
            alloc[c][p] += 1;
            raised[c][p] = true;
            row_need[c] -= 1;
            col_need[p] -= 1;
        }
    }

    // The greedy pass can strand a unit; reroute it along an alternating
    // path of raise/lower moves.
    for c in 0..counts.len() {
        while row_need[c] > 0 {
            match augmenting_path(c, &frac, &raised, &col_need) {
                Some((path, end)) => {
                    for (r, p, raise) in path {
                        if raise {
                            alloc[r][p] += 1;
                        } else {
                            alloc[r][p] -= 1;
                        }
                        raised[r][p] = raise;
                    }
                    col_need[end] -= 1;
                }
                None => {
                    // Unreachable for integer margins; keep totals exact anyway.
                    let p = (0..NUM_PARTITIONS).find(|&p| col_need[p] > 0).unwrap_or(0);
                    alloc[c][p] += 1;
                    col_need[p] = col_need[p].saturating_sub(1);
                }
            }
            row_need[c] -= 1;
        }
    }

    alloc
}

/// Breadth-first search from class `start` for a partition that still
/// needs examples. Returns the moves `(class, partition, raise)` and the
/// partition the path ends in.
fn augmenting_path(
    start: usize,
    frac: &[[f64; NUM_PARTITIONS]],
    raised: &[[bool; NUM_PARTITIONS]],
    col_need: &[usize; NUM_PARTITIONS],
) -> Option<(Vec<(usize, usize, bool)>, usize)> {
    // A partition's parent is the class that raises into it; a class's
    // parent is the partition it gets lowered out of.
    let mut part_parent: [Option<usize>; NUM_PARTITIONS] = [None; NUM_PARTITIONS];
    let mut class_parent: Vec<Option<usize>> = vec![None; frac.len()];
    let mut visited_class = vec![false; frac.len()];
    visited_class[start] = true;

    let mut queue = VecDeque::from([start]);
    while let Some(c) = queue.pop_front() {
        for p in 0..NUM_PARTITIONS {
            if part_parent[p].is_some() || raised[c][p] || frac[c][p] <= 0.0 {
                continue;
            }
            part_parent[p] = Some(c);
            if col_need[p] > 0 {
                let mut path = Vec::new();
                let mut part = p;
                loop {
                    let class = part_parent[part]?;
                    path.push((class, part, true));
                    if class == start {
                        return Some((path, p));
                    }
                    let prev = class_parent[class]?;
                    path.push((class, prev, false));
                    part = prev;
                }
            }
            for (other, row) in raised.iter().enumerate() {
                if row[p] && !visited_class[other] {
                    visited_class[other] = true;
                    class_parent[other] = Some(p);
                    queue.push_back(other);
                }
            }
        }
    }
    None
}
