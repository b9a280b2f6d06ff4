//! Keyset pagination and column projection shared by the list endpoints.

use serde::Serialize;
use serde_json::{Map, Value};
use service_core::error::AppError;

pub const MIN_PAGE_SIZE: i64 = 1;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Rows fetched for one page: one more than requested, so the extra row tells
/// whether another page exists without a separate count query.
pub fn fetch_limit(page_size: i64) -> i64 {
    page_size + 1
}

/// Trim the look-ahead row. Returns the page and whether more rows follow.
pub fn split_page<T>(mut rows: Vec<T>, page_size: i64) -> (Vec<T>, bool) {
    let page_size = usize::try_from(page_size).unwrap_or(0);
    let has_next_page = rows.len() > page_size;
    rows.truncate(page_size);
    (rows, has_next_page)
}

/// Entities whose list endpoint accepts a `select` projection.
pub trait Selectable: Serialize {
    /// Every camelCase column the entity serialises.
    const COLUMNS: &'static [&'static str];
    /// Columns returned whatever the projection (id and ordering timestamp).
    const ALWAYS: &'static [&'static str];
}

/// Check `select` against the entity's columns. The first unknown name is a 422.
pub fn validate_select<T: Selectable>(select: Option<&[String]>) -> Result<(), AppError> {
    if let Some(columns) = select {
        if let Some(bad) = columns.iter().find(|c| !T::COLUMNS.contains(&c.as_str())) {
            return Err(AppError::Unprocessable(anyhow::anyhow!(
                "invalid col to select {}",
                bad
            )));
        }
    }
    Ok(())
}

/// Serialise rows, keeping only the selected columns plus the mandatory ones.
/// Without a projection every column is returned.
pub fn project<T: Selectable>(rows: &[T], select: Option<&[String]>) -> Result<Vec<Value>, AppError> {
    validate_select::<T>(select)?;

    rows.iter()
        .map(|row| {
            let value = serde_json::to_value(row)
                .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to serialise row: {}", e)))?;
            let Some(columns) = select else {
                return Ok(value);
            };
            let Value::Object(full) = value else {
                return Ok(value);
            };
            let projected: Map<String, Value> = full
                .into_iter()
                .filter(|(key, _)| {
                    T::ALWAYS.contains(&key.as_str()) || columns.iter().any(|c| c == key)
                })
                .collect();
            Ok(Value::Object(projected))
        })
        .collect()
}
