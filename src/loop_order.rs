//! Per-operand loop orders.
//!
//! A loop order binds each logical output dimension either to one of the
//! operand's physical dimensions or to a broadcast marker. All operands taking
//! part in one plan carry loop orders of the same length.

use std::fmt;
use std::str::FromStr;

use crate::{LoopError, Result};

/// Binding of one logical dimension for one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopIndex {
    /// The logical dimension walks the operand's physical dimension `d`.
    Concrete(usize),
    /// The operand is repeated along the logical dimension (stride 0).
    Broadcast,
}

impl LoopIndex {
    /// The physical dimension, or `None` for a broadcast binding.
    #[inline]
    pub fn dim(self) -> Option<usize> {
        match self {
            LoopIndex::Concrete(d) => Some(d),
            LoopIndex::Broadcast => None,
        }
    }

    #[inline]
    pub fn is_broadcast(self) -> bool {
        matches!(self, LoopIndex::Broadcast)
    }
}

impl fmt::Display for LoopIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopIndex::Concrete(d) => write!(f, "{d}"),
            LoopIndex::Broadcast => f.write_str("x"),
        }
    }
}

/// Ordered bindings of the logical output dimensions for a single operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LoopOrder {
    indices: Vec<LoopIndex>,
}

impl LoopOrder {
    pub fn new(indices: Vec<LoopIndex>) -> Self {
        Self { indices }
    }

    /// `[0, 1, ..., rank - 1]`: every physical dimension in declaration order.
    pub fn identity(rank: usize) -> Self {
        Self {
            indices: (0..rank).map(LoopIndex::Concrete).collect(),
        }
    }

    /// A loop order that broadcasts along all `len` logical dimensions.
    pub fn broadcast(len: usize) -> Self {
        Self {
            indices: vec![LoopIndex::Broadcast; len],
        }
    }

    /// Build a loop order from per-logical-dimension broadcastable flags.
    ///
    /// A `true` flag yields [`LoopIndex::Broadcast`]; each `false` flag binds the
    /// next physical dimension. An operand whose broadcastable axes were dropped
    /// (rank = number of `false` flags) is thus aligned against the full output.
    pub fn from_broadcastable(broadcastable: &[bool]) -> Self {
        let mut next = 0usize;
        let indices = broadcastable
            .iter()
            .map(|&b| {
                if b {
                    LoopIndex::Broadcast
                } else {
                    let d = next;
                    next += 1;
                    LoopIndex::Concrete(d)
                }
            })
            .collect();
        Self { indices }
    }

    /// Parse the comma-separated notation `"0,x,2"`, with `x` for broadcast.
    ///
    /// Whitespace around entries is ignored; an empty string is the rank-0 order.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let indices = trimmed
            .split(',')
            .map(|tok| match tok.trim() {
                "x" | "X" => Ok(LoopIndex::Broadcast),
                t => t
                    .parse::<usize>()
                    .map(LoopIndex::Concrete)
                    .map_err(|_| LoopError::InvalidLoopOrder(format!("bad entry {t:?} in {s:?}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { indices })
    }

    /// Number of logical dimensions covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn get(&self, level: usize) -> LoopIndex {
        self.indices[level]
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = LoopIndex> + ExactSizeIterator + '_ {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[LoopIndex] {
        &self.indices
    }

    /// Minimum rank required by the concrete bindings, or `None` if every
    /// logical dimension is broadcast.
    pub fn required_rank(&self) -> Option<usize> {
        self.iter().filter_map(LoopIndex::dim).max().map(|d| d + 1)
    }

    /// First logical level with a concrete binding.
    pub fn first_concrete_level(&self) -> Option<usize> {
        self.iter().position(|idx| !idx.is_broadcast())
    }
}

impl From<Vec<LoopIndex>> for LoopOrder {
    fn from(indices: Vec<LoopIndex>) -> Self {
        Self::new(indices)
    }
}

impl FromStr for LoopOrder {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LoopOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, idx) in self.indices.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{idx}")?;
        }
        f.write_str(")")
    }
}

/// Check that every loop order has the same length and return it.
pub(crate) fn common_len(orders: &[LoopOrder]) -> Result<usize> {
    let Some(first) = orders.first() else {
        return Ok(0);
    };
    let expected = first.len();
    for (operand, order) in orders.iter().enumerate().skip(1) {
        if order.len() != expected {
            return Err(LoopError::LoopOrderLengthMismatch {
                operand,
                expected,
                found: order.len(),
            });
        }
    }
    Ok(expected)
}
