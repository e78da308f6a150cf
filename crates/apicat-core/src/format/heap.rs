//! Growable byte tables and the two interning heaps.
//!
//! A row's address is its starting byte offset.  Rows that reference an
//! entity whose offset is not known yet get a placeholder: the entity's
//! discovery-order handle is written in place and its position remembered,
//! and [`TableBuilder::patch`] later overwrites it with the final offset.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::config::MAX_TABLE_SIZE;
use crate::errors::{CatalogError, CatalogResult};
use crate::format::layout::NIL;
use crate::models::Fingerprint;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;
const PROBE_MULTIPLIER: u32 = 747_796_405;
const PROBE_INCREMENT: u32 = 2_891_336_453;

/// 32-bit FNV-1 (multiply, then xor).
pub fn fnv1(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        hash.wrapping_mul(FNV_PRIME) ^ u32::from(*b)
    })
}

/// Next bucket key on collision.
pub fn probe(key: u32) -> u32 {
    key.wrapping_mul(PROBE_MULTIPLIER)
        .wrapping_add(PROBE_INCREMENT)
}

// ---------------------------------------------------------------------------
// TableBuilder
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TableBuilder {
    name: &'static str,
    bytes: Vec<u8>,
    placeholders: Vec<usize>,
}

impl TableBuilder {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bytes: Vec::new(),
            placeholders: Vec::new(),
        }
    }

    /// Offset the next row will start at.
    pub fn offset(&self) -> CatalogResult<u32> {
        if self.bytes.len() > MAX_TABLE_SIZE {
            return Err(CatalogError::TableOverflow {
                table: self.name,
                size: self.bytes.len(),
            });
        }
        Ok(self.bytes.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_count(&mut self, count: usize) -> CatalogResult<()> {
        let count = i32::try_from(count).map_err(|_| CatalogError::TableOverflow {
            table: self.name,
            size: count,
        })?;
        self.write_i32(count);
        Ok(())
    }

    /// Write a resolved reference.
    pub fn write_offset(&mut self, offset: u32) {
        self.write_i32(offset as i32);
    }

    pub fn write_optional_offset(&mut self, offset: Option<u32>) {
        self.write_i32(offset.map_or(NIL, |o| o as i32));
    }

    pub fn write_fingerprint(&mut self, fingerprint: &Fingerprint) {
        self.bytes.extend_from_slice(fingerprint.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Write a deferred reference holding `handle` until [`patch`](Self::patch).
    pub fn write_placeholder(&mut self, handle: usize) {
        self.placeholders.push(self.bytes.len());
        self.write_i32(handle as i32);
    }

    /// Register a placeholder already present at `position`.
    pub fn mark_placeholder(&mut self, position: usize) {
        self.placeholders.push(position);
    }

    /// Replace every placeholder with the offset `resolve` returns for the
    /// handle stored there.  Returns the number patched.
    pub fn patch<F>(&mut self, resolve: F) -> CatalogResult<usize>
    where
        F: Fn(usize) -> Option<u32>,
    {
        let placeholders = std::mem::take(&mut self.placeholders);
        for &position in &placeholders {
            let slot = &mut self.bytes[position..position + 4];
            let handle = LittleEndian::read_i32(slot);
            if handle == NIL {
                continue;
            }
            let offset = resolve(handle as usize).ok_or_else(|| {
                CatalogError::Format(format!(
                    "table {} has unresolved placeholder {handle} at {position}",
                    self.name
                ))
            })?;
            LittleEndian::write_i32(slot, offset as i32);
        }
        Ok(placeholders.len())
    }
}

// ---------------------------------------------------------------------------
// StringHeap
// ---------------------------------------------------------------------------

/// Length-prefixed UTF-8 strings, interned by exact value.
#[derive(Debug)]
pub struct StringHeap {
    table: TableBuilder,
    offsets: HashMap<String, u32>,
}

impl StringHeap {
    pub fn new() -> Self {
        Self {
            table: TableBuilder::new("strings"),
            offsets: HashMap::new(),
        }
    }

    pub fn intern(&mut self, value: &str) -> CatalogResult<u32> {
        if let Some(&offset) = self.offsets.get(value) {
            return Ok(offset);
        }
        let offset = self.table.offset()?;
        self.table.write_count(value.len())?;
        self.table.write_bytes(value.as_bytes());
        self.offsets.insert(value.to_string(), offset);
        Ok(offset)
    }

    pub fn intern_optional(&mut self, value: Option<&str>) -> CatalogResult<Option<u32>> {
        value.map(|v| self.intern(v)).transpose()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.table.into_bytes()
    }
}

impl Default for StringHeap {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BlobHeap
// ---------------------------------------------------------------------------

/// Content-addressed binary records.
///
/// Buckets are keyed by the FNV-1 hash of the blob; a bucket whose stored
/// bytes differ from the new blob sends the probe to the next key.
#[derive(Debug)]
pub struct BlobHeap {
    table: TableBuilder,
    buckets: HashMap<u32, (u32, u32)>,
}

impl BlobHeap {
    pub fn new() -> Self {
        Self {
            table: TableBuilder::new("blobs"),
            buckets: HashMap::new(),
        }
    }

    /// Store `blob` unless identical bytes are already present.  Returns the
    /// blob's offset and whether it was newly written.
    pub fn add(&mut self, blob: &[u8]) -> CatalogResult<(u32, bool)> {
        let mut key = fnv1(blob);
        loop {
            match self.buckets.get(&key) {
                None => {
                    let offset = self.table.offset()?;
                    self.table.write_bytes(blob);
                    self.buckets.insert(key, (offset, blob.len() as u32));
                    return Ok((offset, true));
                }
                Some(&(offset, len)) => {
                    let start = offset as usize;
                    let stored = &self.table.as_bytes()[start..start + len as usize];
                    if stored == blob {
                        return Ok((offset, false));
                    }
                    key = probe(key);
                }
            }
        }
    }

    /// Like [`add`](Self::add), registering `placeholders` (positions relative
    /// to the blob start) when the blob is newly written.
    pub fn add_with_placeholders(
        &mut self,
        blob: &[u8],
        placeholders: &[usize],
    ) -> CatalogResult<(u32, bool)> {
        let (offset, is_new) = self.add(blob)?;
        if is_new {
            for relative in placeholders {
                self.table.mark_placeholder(offset as usize + relative);
            }
        }
        Ok((offset, is_new))
    }

    pub fn patch<F>(&mut self, resolve: F) -> CatalogResult<usize>
    where
        F: Fn(usize) -> Option<u32>,
    {
        self.table.patch(resolve)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.table.into_bytes()
    }
}

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two distinct byte strings with the same FNV-1 hash.
    const COLLIDING_A: &[u8] = b"syntax-79578";
    const COLLIDING_B: &[u8] = b"syntax-420826";

    #[test]
    fn test_fnv1_known_values() {
        assert_eq!(fnv1(b""), 0x811c_9dc5);
        // FNV-1 32 of "a": (basis * prime) ^ 0x61
        assert_eq!(fnv1(b"a"), 0x050c_5d7e);
    }

    #[test]
    fn test_colliding_inputs_share_hash() {
        assert_ne!(COLLIDING_A, COLLIDING_B);
        assert_eq!(fnv1(COLLIDING_A), fnv1(COLLIDING_B));
        assert_eq!(fnv1(COLLIDING_A), 0x6d3b_91cb);
    }

    #[test]
    fn test_blob_collision_probes_next_bucket() {
        let mut heap = BlobHeap::new();
        let (a, a_new) = heap.add(COLLIDING_A).unwrap();
        let (b, b_new) = heap.add(COLLIDING_B).unwrap();
        assert!(a_new && b_new);
        assert_ne!(a, b);
        assert_eq!(heap.buckets.len(), 2);
        assert!(heap.buckets.contains_key(&probe(fnv1(COLLIDING_A))));

        let bytes = heap.table.as_bytes();
        assert_eq!(&bytes[a as usize..a as usize + COLLIDING_A.len()], COLLIDING_A);
        assert_eq!(&bytes[b as usize..b as usize + COLLIDING_B.len()], COLLIDING_B);

        // Re-adding either finds its own bucket, the second via the probe.
        assert_eq!(heap.add(COLLIDING_A).unwrap(), (a, false));
        assert_eq!(heap.add(COLLIDING_B).unwrap(), (b, false));
        assert_eq!(heap.len(), COLLIDING_A.len() + COLLIDING_B.len());
    }

    #[test]
    fn test_blob_dedup_identical_bytes() {
        let mut heap = BlobHeap::new();
        let (a, _) = heap.add(&[1, 2, 3]).unwrap();
        let (b, b_new) = heap.add(&[1, 2, 3]).unwrap();
        let (c, _) = heap.add(&[1, 2, 4]).unwrap();
        assert_eq!(a, b);
        assert!(!b_new);
        assert_eq!(c, 3);
    }

    #[test]
    fn test_string_heap_interns() {
        let mut heap = StringHeap::new();
        let a = heap.intern("System").unwrap();
        let b = heap.intern("Object").unwrap();
        let c = heap.intern("System").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 4 + 6);
        assert_eq!(a, c);
        assert_eq!(heap.len(), 4 + 6 + 4 + 6);
        assert_eq!(heap.intern_optional(None).unwrap(), None);
    }

    #[test]
    fn test_placeholders_patched_in_place() {
        let mut table = TableBuilder::new("test");
        table.write_i32(7);
        table.write_placeholder(2);
        table.write_placeholder(0);
        table.write_optional_offset(None);
        assert_eq!(table.placeholder_count(), 2);

        let offsets = [100u32, 200, 300];
        let patched = table.patch(|handle| offsets.get(handle).copied()).unwrap();
        assert_eq!(patched, 2);
        assert_eq!(table.placeholder_count(), 0);

        let bytes = table.as_bytes();
        assert_eq!(LittleEndian::read_i32(&bytes[0..4]), 7);
        assert_eq!(LittleEndian::read_i32(&bytes[4..8]), 300);
        assert_eq!(LittleEndian::read_i32(&bytes[8..12]), 100);
        assert_eq!(LittleEndian::read_i32(&bytes[12..16]), NIL);
    }

    #[test]
    fn test_unresolved_placeholder_is_error() {
        let mut table = TableBuilder::new("test");
        table.write_placeholder(5);
        assert!(table.patch(|_| None).is_err());
    }

    #[test]
    fn test_blob_placeholders_only_registered_once() {
        let mut heap = BlobHeap::new();
        let blob = [0u8, 0, 0, 0];
        heap.add_with_placeholders(&blob, &[0]).unwrap();
        heap.add_with_placeholders(&blob, &[0]).unwrap();
        assert_eq!(heap.table.placeholder_count(), 1);
        assert_eq!(heap.patch(|_| Some(42)).unwrap(), 1);
        assert_eq!(LittleEndian::read_i32(&heap.table.as_bytes()[0..4]), 42);
    }
}
