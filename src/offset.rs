//! Logical to physical offset translation

use crate::part_table::PartTable;

/// Physical position of a logical offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Index of the part holding the byte
    pub part_index: usize,
    /// Byte offset inside that part's object, header included
    pub physical_offset: u64,
    /// Logical bytes left in the part from this position
    pub remaining_in_part: u64,
}

/// Map `logical_offset` onto the part that holds it
///
/// Returns `None` at or beyond the end of the virtual file. Parts that
/// contribute no logical bytes are never selected.
///
/// # Examples
/// ```
/// use objfile::{translate, ObjectMeta, PartTable};
///
/// // Two parts sharing a 2-byte header "h\n"
/// let table = PartTable::new(
///     "b",
///     vec![ObjectMeta::new("p1", 6), ObjectMeta::new("p2", 6)],
///     2,
/// );
/// let loc = translate(&table, 7).unwrap();
/// assert_eq!(loc.part_index, 1);
/// assert_eq!(loc.physical_offset, 3);
/// assert!(translate(&table, 10).is_none());
/// ```
pub fn translate(table: &PartTable, logical_offset: u64) -> Option<Location> {
    let cumulative = table.cumulative();
    let part_index = cumulative.partition_point(|&end| end <= logical_offset);
    if part_index == cumulative.len() {
        return None;
    }

    let part_start = if part_index == 0 {
        0
    } else {
        cumulative[part_index - 1]
    };
    let part = table.part(part_index);

    Some(Location {
        part_index,
        physical_offset: logical_offset - part_start + part.header_len,
        remaining_in_part: cumulative[part_index] - logical_offset,
    })
}
