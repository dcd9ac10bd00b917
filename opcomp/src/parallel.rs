//! Fork-join dispatch of per-matrix operations

use rayon::prelude::*;

use crate::error::{OpError, Result};

/// Apply `op` to every matrix of every slot on the worker pool.
///
/// Blocks until every job has finished. Jobs touch one matrix each, so
/// completion order is irrelevant; the first error is returned.
pub fn for_all_operators<M, F>(
    slots: &mut [Vec<M>],
    num_threads: Option<usize>,
    op: F,
) -> Result<()>
where
    M: Send,
    F: Fn(&mut M) -> Result<()> + Sync + Send,
{
    match num_threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(OpError::from)?
            .install(|| run(slots, &op)),
        None => run(slots, &op),
    }
}

fn run<M, F>(slots: &mut [Vec<M>], op: &F) -> Result<()>
where
    M: Send,
    F: Fn(&mut M) -> Result<()> + Sync,
{
    slots
        .par_iter_mut()
        .flat_map_iter(|slot| slot.iter_mut())
        .try_for_each(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixError;

    #[test]
    fn test_visits_every_matrix() {
        let mut slots = vec![vec![1, 2], vec![], vec![3]];
        for_all_operators(&mut slots, None, |m| {
            *m *= 10;
            Ok(())
        })
        .unwrap();
        assert_eq!(slots, vec![vec![10, 20], vec![], vec![30]]);
    }

    #[test]
    fn test_dedicated_pool() {
        let mut slots: Vec<Vec<u64>> = (0..16).map(|i| vec![i; 4]).collect();
        for_all_operators(&mut slots, Some(2), |m| {
            *m += 1;
            Ok(())
        })
        .unwrap();
        assert!(slots.iter().enumerate().all(|(i, s)| s.iter().all(|&v| v == i as u64 + 1)));
    }

    #[test]
    fn test_error_propagates() {
        let mut slots = vec![vec![1, 2, 3]];
        let result = for_all_operators(&mut slots, None, |m| {
            if *m == 2 {
                Err(MatrixError::Kernel("bad element".into()).into())
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(OpError::Matrix(MatrixError::Kernel(_)))));
    }
}
