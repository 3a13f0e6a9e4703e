// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Reed-Solomon forward error correction over fixed-width segment payloads.

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::error::{NdnRtcError, Result};

/// Default parity ratio applied when a caller does not override it.
pub const DEFAULT_PARITY_RATIO: f64 = 0.2;

/// Number of parity shards produced for `n_data` data shards at `ratio`.
pub fn parity_count(n_data: usize, ratio: f64) -> usize {
    ((n_data as f64) * ratio).ceil() as usize
}

/// Produces parity shards for a set of equal-length data shards.
///
/// `shards` must all share the same length (callers pad the final data
/// segment beforehand, as `slice` does). Returns one parity shard per
/// `parity_count(shards.len(), ratio)`.
pub fn encode_parity(shards: &[Vec<u8>], ratio: f64) -> Result<Vec<Vec<u8>>> {
    let n_data = shards.len();
    if n_data == 0 {
        return Ok(Vec::new());
    }
    let shard_len = shards[0].len();
    if shards.iter().any(|s| s.len() != shard_len) {
        return Err(NdnRtcError::Configuration(
            "all data shards must share one length before FEC encoding".into(),
        ));
    }
    let n_parity = parity_count(n_data, ratio);
    if n_parity == 0 {
        return Ok(Vec::new());
    }
    let rs = ReedSolomon::new(n_data, n_parity)
        .map_err(|e| NdnRtcError::Configuration(format!("invalid reed-solomon shard counts: {e}")))?;

    let mut all_shards: Vec<Vec<u8>> = shards.to_vec();
    all_shards.extend(std::iter::repeat(vec![0u8; shard_len]).take(n_parity));

    rs.encode(&mut all_shards).map_err(|e| NdnRtcError::Runtime(format!("FEC encode failed: {e}")))?;

    Ok(all_shards.split_off(n_data))
}

/// Reconstructs the original `n_data` shards given a possibly-incomplete set
/// of data and parity shards. `shards[i]` is `Some` for data index `i` when
/// present, `None` when missing; the first `n_data` entries are data shards,
/// the rest parity. Fails unless at least `n_data` shards total are present.
pub fn reassemble(mut shards: Vec<Option<Vec<u8>>>, n_data: usize, n_parity: usize) -> Result<Vec<Vec<u8>>> {
    let available = shards.iter().filter(|s| s.is_some()).count();
    if available < n_data {
        return Err(NdnRtcError::FecUnrecoverable { available, required: n_data });
    }
    if n_parity == 0 {
        return shards
            .into_iter()
            .take(n_data)
            .collect::<Option<Vec<_>>>()
            .ok_or(NdnRtcError::FecUnrecoverable { available, required: n_data });
    }
    let rs = ReedSolomon::new(n_data, n_parity)
        .map_err(|e| NdnRtcError::Configuration(format!("invalid reed-solomon shard counts: {e}")))?;
    rs.reconstruct_data(&mut shards)
        .map_err(|e| NdnRtcError::Runtime(format!("FEC reconstruction failed: {e}")))?;
    shards
        .into_iter()
        .take(n_data)
        .map(|s| s.ok_or(NdnRtcError::FecUnrecoverable { available, required: n_data }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_shards(n: usize, len: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8; len]).collect()
    }

    #[test]
    fn test_parity_count_default_ratio() {
        assert_eq!(parity_count(8, DEFAULT_PARITY_RATIO), 2);
        assert_eq!(parity_count(7, DEFAULT_PARITY_RATIO), 2);
    }

    #[test]
    fn test_reassemble_with_all_data_present_skips_rs() {
        let shards = data_shards(4, 16);
        let parity = encode_parity(&shards, 0.5).unwrap();
        assert_eq!(parity.len(), 2);

        let input: Vec<Option<Vec<u8>>> = shards.iter().cloned().map(Some).chain(vec![None, None]).collect();
        let out = reassemble(input, 4, 2).unwrap();
        assert_eq!(out, shards);
    }

    #[test]
    fn test_reassemble_recovers_from_missing_data_shards() {
        let shards = data_shards(4, 16);
        let parity = encode_parity(&shards, 0.5).unwrap();

        let mut input: Vec<Option<Vec<u8>>> = Vec::new();
        input.push(None); // missing data[0]
        input.push(Some(shards[1].clone()));
        input.push(None); // missing data[2]
        input.push(Some(shards[3].clone()));
        input.extend(parity.into_iter().map(Some));

        let out = reassemble(input, 4, 2).unwrap();
        assert_eq!(out, shards);
    }

    #[test]
    fn test_reassemble_fails_when_too_few_shards() {
        let shards = data_shards(4, 16);
        let input: Vec<Option<Vec<u8>>> = vec![Some(shards[0].clone()), None, None, None, None, None];
        let err = reassemble(input, 4, 2).unwrap_err();
        assert!(matches!(err, NdnRtcError::FecUnrecoverable { .. }));
    }
}
