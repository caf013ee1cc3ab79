//! Reduction of partial normal equations.
//!
//! Workers each accumulate normal equations over their own share of the
//! data and ship them, usually serialized, to a coordinating process which
//! folds them into one. Each partial set is owned by exactly one worker and
//! combined only through explicit merges.

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::config::{ReduceConfig, ReduceStrategy};
use super::generic::GenericNormalEquations;
use crate::error::Result;

/// Fold partial normal equations into one.
///
/// An empty input gives empty normal equations. With
/// [`ReduceStrategy::PairwiseTree`] the grouping of merges depends only on
/// the number of inputs, so the result is bit-for-bit the same whether or
/// not the branches run in parallel.
///
/// # Errors
///
/// * `NormalEqError::DimensionMismatch` if a parameter has different
///   dimensions in two of the inputs
pub fn merge_all(
    stores: Vec<GenericNormalEquations>,
    config: &ReduceConfig,
) -> Result<GenericNormalEquations> {
    debug!(
        "reducing {} partial normal equations with {:?}",
        stores.len(),
        config.strategy
    );
    match config.strategy {
        ReduceStrategy::Sequential => {
            let mut iter = stores.into_iter();
            let Some(mut acc) = iter.next() else {
                return Ok(GenericNormalEquations::new());
            };
            for store in iter {
                acc.merge_generic(&store)?;
            }
            Ok(acc)
        }
        ReduceStrategy::PairwiseTree => tree_reduce(stores, config.parallel),
    }
}

/// Decode serialized partial normal equations and fold them into one.
///
/// # Errors
///
/// * Any error of [`GenericNormalEquations::from_bytes`] for an undecodable buffer
/// * Any error of [`merge_all`]
pub fn reduce_serialized<B>(buffers: &[B], config: &ReduceConfig) -> Result<GenericNormalEquations>
where
    B: AsRef<[u8]> + Sync,
{
    let stores = decode_all(buffers, config.parallel)?;
    merge_all(stores, config)
}

#[cfg(feature = "parallel")]
fn decode_all<B>(buffers: &[B], parallel: bool) -> Result<Vec<GenericNormalEquations>>
where
    B: AsRef<[u8]> + Sync,
{
    if parallel {
        buffers
            .par_iter()
            .map(|b| GenericNormalEquations::from_bytes(b.as_ref()))
            .collect()
    } else {
        buffers
            .iter()
            .map(|b| GenericNormalEquations::from_bytes(b.as_ref()))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn decode_all<B>(buffers: &[B], _parallel: bool) -> Result<Vec<GenericNormalEquations>>
where
    B: AsRef<[u8]>,
{
    buffers
        .iter()
        .map(|b| GenericNormalEquations::from_bytes(b.as_ref()))
        .collect()
}

fn tree_reduce(
    mut stores: Vec<GenericNormalEquations>,
    parallel: bool,
) -> Result<GenericNormalEquations> {
    match stores.len() {
        0 | 1 => Ok(stores.pop().unwrap_or_default()),
        n => {
            let right = stores.split_off(n / 2);
            let (left, right) = join(
                parallel,
                || tree_reduce(stores, parallel),
                || tree_reduce(right, parallel),
            );
            let mut left = left?;
            left.merge_generic(&right?)?;
            Ok(left)
        }
    }
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if parallel {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(_parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}
