//! Lookups against the sorted annotation and extension-method tables.
//!
//! Annotation rows lead with the signed key `(api, assembly)` and are sorted
//! on it, with `NIL` (-1) standing for "the whole assembly".  Assembly-level
//! and API-level annotations are therefore separate lookups: the caller
//! always supplies the full key, nil included, and every probe compares the
//! whole pair.

use std::cmp::Ordering;
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use super::Catalog;
use crate::format::layout::{annotation_row, extension_row, TableId, NIL};

fn row_key(rows: &[u8], position: usize) -> (i32, i32) {
    (
        LittleEndian::read_i32(&rows[position + annotation_row::API..]),
        LittleEndian::read_i32(&rows[position + annotation_row::ASSEMBLY..]),
    )
}

/// Byte position of the row keyed `(api, assembly)`, if any.
pub(crate) fn find_row(rows: &[u8], row_size: usize, api: i32, assembly: i32) -> Option<usize> {
    let key = (api, assembly);
    let mut low = 0;
    let mut high = rows.len() / row_size;
    while low < high {
        let mid = low + (high - low) / 2;
        let position = mid * row_size;
        match row_key(rows, position).cmp(&key) {
            Ordering::Less => low = mid + 1,
            Ordering::Greater => high = mid,
            Ordering::Equal => return Some(position),
        }
    }
    None
}

/// Row indices of extension methods whose extended type is `extended_type`.
pub(crate) fn extension_rows(rows: &[u8], extended_type: i32) -> Range<usize> {
    let count = rows.len() / extension_row::SIZE;
    let type_at = |index: usize| {
        LittleEndian::read_i32(&rows[index * extension_row::SIZE + extension_row::EXTENDED_TYPE..])
    };
    let lower_bound = |value: i32| {
        let (mut low, mut high) = (0, count);
        while low < high {
            let mid = low + (high - low) / 2;
            if type_at(mid) < value {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    };
    let start = lower_bound(extended_type);
    let end = if extended_type == i32::MAX {
        count
    } else {
        lower_bound(extended_type + 1)
    };
    start..end
}

impl Catalog {
    /// Offset of the annotation row for `api` (or the whole assembly when
    /// `None`) in `assembly`.
    pub(crate) fn find_annotation(
        &self,
        table: TableId,
        row_size: usize,
        api: Option<u32>,
        assembly: u32,
    ) -> Option<u32> {
        let api = api.map_or(NIL, |offset| offset as i32);
        find_row(self.table(table), row_size, api, assembly as i32).map(|p| p as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROW_SIZE: usize = 12;

    fn table(keys: &[(i32, i32)]) -> Vec<u8> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut rows = Vec::new();
        for (i, (api, assembly)) in sorted.iter().enumerate() {
            rows.extend_from_slice(&api.to_le_bytes());
            rows.extend_from_slice(&assembly.to_le_bytes());
            rows.extend_from_slice(&(i as i32).to_le_bytes());
        }
        rows
    }

    fn find_row_linear(rows: &[u8], api: i32, assembly: i32) -> Option<usize> {
        (0..rows.len() / ROW_SIZE)
            .map(|i| i * ROW_SIZE)
            .find(|&position| row_key(rows, position) == (api, assembly))
    }

    fn agrees_everywhere(rows: &[u8]) {
        for api in -1..24 {
            for assembly in 0..12 {
                assert_eq!(
                    find_row(rows, ROW_SIZE, api, assembly),
                    find_row_linear(rows, api, assembly),
                    "key ({api}, {assembly})"
                );
            }
        }
    }

    #[test]
    fn test_empty_table() {
        agrees_everywhere(&table(&[]));
        assert_eq!(find_row(&[], ROW_SIZE, NIL, 0), None);
    }

    #[test]
    fn test_single_row() {
        let rows = table(&[(4, 8)]);
        agrees_everywhere(&rows);
        assert_eq!(find_row(&rows, ROW_SIZE, 4, 8), Some(0));
    }

    #[test]
    fn test_nil_and_api_rows_for_same_assembly() {
        let rows = table(&[(NIL, 8), (0, 8), (4, 8), (NIL, 0), (4, 0)]);
        agrees_everywhere(&rows);
        // Sorted: (-1,0) (-1,8) (0,8) (4,0) (4,8)
        assert_eq!(find_row(&rows, ROW_SIZE, NIL, 8), Some(ROW_SIZE));
        assert_eq!(find_row(&rows, ROW_SIZE, 4, 8), Some(4 * ROW_SIZE));
        assert_eq!(find_row(&rows, ROW_SIZE, 0, 0), None);
    }

    #[test]
    fn test_extension_rows() {
        let mut rows = Vec::new();
        for (extended_type, method) in [(0, 4), (8, 12), (8, 16), (20, 24)] {
            rows.extend_from_slice(&[0u8; 16]);
            rows.extend_from_slice(&i32::to_le_bytes(extended_type));
            rows.extend_from_slice(&i32::to_le_bytes(method));
        }
        assert_eq!(extension_rows(&rows, 8), 1..3);
        assert_eq!(extension_rows(&rows, 0), 0..1);
        assert!(extension_rows(&rows, 4).is_empty());
        assert!(extension_rows(&[], 0).is_empty());
    }

    proptest! {
        #[test]
        fn prop_binary_search_matches_linear_scan(
            keys in prop::collection::vec((-1i32..24, 0i32..12), 0..40)
        ) {
            agrees_everywhere(&table(&keys));
        }
    }
}
