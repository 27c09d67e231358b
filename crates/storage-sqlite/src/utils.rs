//! Utility functions for SQLite storage operations.

/// Maximum number of bound parameters SQLite accepts in one statement.
///
/// Older SQLite builds cap `SQLITE_MAX_VARIABLE_NUMBER` at 999. Multi-row
/// inserts are sized against this value so they work on any build.
pub const SQLITE_MAX_PARAMS: usize = 999;

/// Rows per multi-row `INSERT` for a table with `columns` bound columns.
pub fn rows_per_insert(columns: usize) -> usize {
    (SQLITE_MAX_PARAMS / columns.max(1)).max(1)
}

/// Chunk rows so that each chunk fits in one multi-row `INSERT`.
///
/// # Example
///
/// ```ignore
/// for chunk in chunk_for_insert(&rows, TOKEN_COLUMNS) {
///     diesel::insert_into(tokens::table).values(chunk).execute(conn)?;
/// }
/// ```
pub fn chunk_for_insert<T>(items: &[T], columns: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(rows_per_insert(columns))
}
