// ABOUTME: Splits an ordered work list into fixed-size batches
// ABOUTME: Batch size caps how many tables are in flight at once

/// Partition `items` into consecutive batches of at most `chunk_size` items
///
/// Order is preserved within and across batches. A non-positive
/// `chunk_size` is treated as 1, which makes the run fully sequential.
///
/// ```
/// # use pg_catalog_dump::dump::chunk_tables;
/// let tables = ["a", "b", "c", "d", "e"];
/// let batches = chunk_tables(&tables, 2);
/// assert_eq!(batches, vec![&["a", "b"][..], &["c", "d"][..], &["e"][..]]);
/// ```
pub fn chunk_tables<T>(items: &[T], chunk_size: isize) -> Vec<&[T]> {
    let size = usize::try_from(chunk_size).unwrap_or(0).max(1);
    items.chunks(size).collect()
}
