//! Combining per-worker results into a job result.

use crate::sink::KeyedValue;

/// Errors that can occur while merging keyed results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("worker {worker} wrote key {key}, but only {keys} keys exist")]
    KeyOutOfRange {
        worker: usize,
        key: usize,
        keys: usize,
    },
    #[error("key {key} written by both worker {first} and worker {second}")]
    DuplicateKey {
        key: usize,
        first: usize,
        second: usize,
    },
    #[error("no worker wrote keys {missing:?}")]
    MissingKeys { missing: Vec<usize> },
}

/// Concatenates worker results in worker-index order.
///
/// With contiguous ascending assignments the result is already ascending;
/// `sort` re-sorts it for assignments that do not guarantee that.
#[must_use]
pub fn merge_sequence<R>(parts: Vec<Vec<R>>, sort: bool) -> Vec<R>
where
    R: Ord,
{
    let mut merged = parts.into_iter().flatten().collect::<Vec<_>>();
    if sort {
        merged.sort_unstable();
    }
    merged
}

/// Places every keyed value at its key in a dense array of `keys` slots.
///
/// # Errors
///
/// Fails unless every key in `0..keys` is written by exactly one worker.
pub fn merge_keyed(parts: Vec<Vec<KeyedValue>>, keys: usize) -> Result<Vec<f64>, MergeError> {
    let mut values = vec![0.0; keys];
    let mut writer = vec![None; keys];

    for (worker, part) in parts.into_iter().enumerate() {
        for KeyedValue { key, value } in part {
            let slot = writer
                .get_mut(key)
                .ok_or(MergeError::KeyOutOfRange { worker, key, keys })?;
            if let Some(first) = *slot {
                return Err(MergeError::DuplicateKey {
                    key,
                    first,
                    second: worker,
                });
            }
            *slot = Some(worker);
            values[key] = value;
        }
    }

    let missing = writer
        .iter()
        .enumerate()
        .filter_map(|(key, w)| w.is_none().then_some(key))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(MergeError::MissingKeys { missing });
    }
    Ok(values)
}
