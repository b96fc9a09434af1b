//! Resource-quantity parsing.
//!
//! Limits arrive as Kubernetes quantity strings. Skiff canonicalizes CPU to
//! millicores and memory to bytes; runtime drivers convert millicores to
//! whatever their daemon natively understands (shares, nano-CPUs, ...).
//!
//! Grammar accepted here:
//! - CPU: a decimal number of cores (`0.5`, `2`) or an integer of
//!   thousandths with an `m` suffix (`500m`).
//! - Memory: an integer with an optional `Ki`/`Mi`/`Gi` suffix
//!   (powers of 1024); no suffix means bytes.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("invalid cpu quantity: {0:?}")]
    Cpu(String),

    #[error("invalid memory quantity: {0:?}")]
    Memory(String),
}

const KIBIBYTE: u64 = 1024;
const MEBIBYTE: u64 = 1024 * 1024;
const GIBIBYTE: u64 = 1024 * 1024 * 1024;

/// Parse a CPU quantity into millicores.
pub fn parse_cpu_millis(quantity: &str) -> Result<i64, QuantityError> {
    let quantity = quantity.trim();
    if let Some(millis) = quantity.strip_suffix('m') {
        return millis
            .parse::<i64>()
            .ok()
            .filter(|m| *m >= 0)
            .ok_or_else(|| QuantityError::Cpu(quantity.to_string()));
    }
    let cores = quantity
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && *c >= 0.0)
        .ok_or_else(|| QuantityError::Cpu(quantity.to_string()))?;
    Ok((cores * 1000.0).round() as i64)
}

/// Parse a memory quantity into bytes.
pub fn parse_memory_bytes(quantity: &str) -> Result<u64, QuantityError> {
    let quantity = quantity.trim();
    let (digits, unit) = match quantity {
        q if q.ends_with("Ki") => (&q[..q.len() - 2], KIBIBYTE),
        q if q.ends_with("Mi") => (&q[..q.len() - 2], MEBIBYTE),
        q if q.ends_with("Gi") => (&q[..q.len() - 2], GIBIBYTE),
        q => (q, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(|| QuantityError::Memory(quantity.to_string()))
}
