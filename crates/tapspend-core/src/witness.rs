//! Segwit witness stacks for a single input.
//!
//! ```text
//! compact_size(n) || compact_size(len_0) || item_0 || ... || compact_size(len_n-1) || item_n-1
//! ```

use crate::compact_size::{self, MAX_SIZE};
use crate::error::{Result, SpendError};

/// Ordered witness items, bottom of the stack first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessStack(Vec<Vec<u8>>);

impl WitnessStack {
    pub fn new(items: Vec<Vec<u8>>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: Vec<u8>) {
        self.0.push(item);
    }

    pub fn into_inner(self) -> Vec<Vec<u8>> {
        self.0
    }

    /// Exact length of [`serialize`](Self::serialize)'s output.
    pub fn serialized_len(&self) -> usize {
        compact_size::encoded_len(self.0.len() as u64)
            + self
                .0
                .iter()
                .map(|item| compact_size::encoded_len(item.len() as u64) + item.len())
                .sum::<usize>()
    }

    /// Serialize in segwit wire format.
    ///
    /// Items larger than [`MAX_SIZE`] are refused, since no decoder would read
    /// them back.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.0.len() as u64 > MAX_SIZE {
            return Err(SpendError::Serialization(format!(
                "witness has {} items",
                self.0.len()
            )));
        }
        if let Some(item) = self.0.iter().find(|item| item.len() as u64 > MAX_SIZE) {
            return Err(SpendError::Serialization(format!(
                "witness item of {} bytes exceeds {}",
                item.len(),
                MAX_SIZE
            )));
        }

        let mut out = Vec::with_capacity(self.serialized_len());
        compact_size::write(&mut out, self.0.len() as u64);
        for item in &self.0 {
            compact_size::write(&mut out, item.len() as u64);
            out.extend_from_slice(item);
        }
        Ok(out)
    }

    /// Parse a serialized witness. The whole slice must be consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (stack, consumed) = Self::read(bytes)?;
        if consumed != bytes.len() {
            return Err(SpendError::Serialization(format!(
                "{} trailing bytes after witness",
                bytes.len() - consumed
            )));
        }
        Ok(stack)
    }

    /// Parse one witness from the front of `bytes`, returning it with the
    /// number of bytes consumed.
    pub fn read(bytes: &[u8]) -> Result<(Self, usize)> {
        let (count, mut pos) = compact_size::read(bytes)?;
        if count > MAX_SIZE {
            return Err(SpendError::Serialization(format!(
                "witness item count {} exceeds {}",
                count, MAX_SIZE
            )));
        }

        // Every item needs at least its one-byte length prefix.
        let remaining = bytes.len() - pos;
        if count as usize > remaining {
            return Err(SpendError::Serialization(format!(
                "witness claims {} items but only {} bytes remain",
                count, remaining
            )));
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (len, n) = compact_size::read(&bytes[pos..])?;
            pos += n;
            if len > MAX_SIZE {
                return Err(SpendError::Serialization(format!(
                    "witness item of {} bytes exceeds {}",
                    len, MAX_SIZE
                )));
            }
            let end = pos
                .checked_add(len as usize)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| SpendError::Serialization("truncated witness item".into()))?;
            items.push(bytes[pos..end].to_vec());
            pos = end;
        }

        Ok((Self(items), pos))
    }
}

impl From<Vec<Vec<u8>>> for WitnessStack {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self(items)
    }
}

impl From<&WitnessStack> for bitcoin::Witness {
    fn from(stack: &WitnessStack) -> Self {
        bitcoin::Witness::from_slice(&stack.0)
    }
}
