//! Splits one on-disk archive file into the containers packed inside it.
//!
//! A single file may hold several containers back-to-back, or at start
//! offsets known in advance from an envelope pre-scan. Either way the file
//! is walked lazily, one container per step.

use anyhow::{bail, Context, Result};
use bytes::Bytes;

use crate::container::{Container, ContainerFormat};

/// Lazy sequence of `(container_start_offset, container)` pairs within one
/// file. Finite, and fused after the first error; walking the file again
/// requires a fresh iterator.
pub struct BundleIter<'a> {
    data: &'a Bytes,
    format: &'a dyn ContainerFormat,
    /// Known container starts, ascending. Empty means sequential mode.
    offsets: Vec<u64>,
    next_known: usize,
    pos: u64,
    done: bool,
}

/// Walk the containers inside `data`. An empty `known_offsets` slice means
/// the file holds containers back-to-back starting at position 0; otherwise
/// each offset is visited in ascending order and one container is parsed
/// per offset.
pub fn split_bundles<'a>(
    data: &'a Bytes,
    known_offsets: &[u64],
    format: &'a dyn ContainerFormat,
) -> BundleIter<'a> {
    let mut offsets = known_offsets.to_vec();
    offsets.sort_unstable();

    BundleIter {
        data,
        format,
        offsets,
        next_known: 0,
        pos: 0,
        done: false,
    }
}

impl BundleIter<'_> {
    fn read_at(&mut self, pos: u64) -> Result<(u64, Container)> {
        if pos > self.data.len() as u64 {
            bail!("Container offset {} is past the end of the file", pos);
        }

        let container = self
            .format
            .read(&self.data.slice(pos as usize..))
            .with_context(|| format!("Failed to parse container at offset {}", pos))?;
        if container.size == 0 {
            bail!("Container at offset {} has zero length", pos);
        }

        self.pos = pos + container.size;
        Ok((pos, container))
    }
}

impl Iterator for BundleIter<'_> {
    type Item = Result<(u64, Container)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let pos = if self.offsets.is_empty() {
            // Sequential mode: each parse leaves `pos` at the start of the
            // next container; the walk ends when it reaches the file length
            if self.pos >= self.data.len() as u64 {
                self.done = true;
                return None;
            }
            self.pos
        } else {
            if self.next_known == self.offsets.len() {
                self.done = true;
                return None;
            }
            let pos = self.offsets[self.next_known];
            self.next_known += 1;
            pos
        };

        let item = self.read_at(pos);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
