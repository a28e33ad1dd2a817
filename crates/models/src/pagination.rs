//! Keyset pagination over `(created_at, id)`.
//!
//! A cursor names the last row of the previous page. Because rows are
//! ordered by an immutable `(created_at, id)` pair, replaying a cursor
//! always yields the same page and advancing it never repeats or skips
//! a row, even while new rows are inserted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorError(pub String);

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid cursor: {}", self.0)
    }
}

impl std::error::Error for CursorError {}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Opaque, URL-safe form handed to clients
    pub fn encode(&self) -> String {
        let raw = format!("{}|{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| CursorError(e.to_string()))?;
        let raw = String::from_utf8(bytes).map_err(|e| CursorError(e.to_string()))?;

        let (micros, id) = raw
            .split_once('|')
            .ok_or_else(|| CursorError("missing separator".to_string()))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| CursorError("bad timestamp".to_string()))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| CursorError("timestamp out of range".to_string()))?;
        let id = Uuid::parse_str(id).map_err(|e| CursorError(e.to_string()))?;

        Ok(Self { created_at, id })
    }
}

/// Query string accepted by every paged endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn cursor(&self) -> Result<Option<Cursor>, CursorError> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(None),
            Some(c) => Cursor::decode(c).map(Some),
        }
    }
}

/// Rows that can be paged by keyset
pub trait Keyed {
    fn cursor(&self) -> Cursor;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T: Keyed> Page<T> {
    /// Build a page from `limit + 1` fetched rows; the extra row only
    /// signals that another page exists.
    pub fn from_overfetch(mut rows: Vec<T>, limit: u32) -> Self {
        let limit = limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|row| row.cursor().encode())
        } else {
            None
        };

        Self {
            items: rows,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Debug, Clone)]
    struct Row {
        created_at: DateTime<Utc>,
        id: Uuid,
    }

    impl Keyed for Row {
        fn cursor(&self) -> Cursor {
            Cursor::new(self.created_at, self.id)
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        let base = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_000_000).unwrap();
        (0..n)
            .map(|i| Row {
                created_at: base + Duration::microseconds(i as i64),
                id: Uuid::new_v4(),
            })
            .collect()
    }

    /// Mirrors the repository keyset predicate for ascending order.
    fn page_after(all: &[Row], cursor: Option<Cursor>, limit: u32) -> Page<Row> {
        let fetched: Vec<Row> = all
            .iter()
            .filter(|r| match cursor {
                None => true,
                Some(c) => (r.created_at, r.id) > (c.created_at, c.id),
            })
            .take(limit as usize + 1)
            .cloned()
            .collect();
        Page::from_overfetch(fetched, limit)
    }

    #[test]
    fn test_cursor_survives_encoding() {
        let cursor = Cursor::new(Utc::now(), Uuid::new_v4());
        let decoded = Cursor::decode(&cursor.encode()).unwrap();

        assert_eq!(decoded.id, cursor.id);
        assert_eq!(
            decoded.created_at.timestamp_micros(),
            cursor.created_at.timestamp_micros()
        );
    }

    #[test]
    fn test_garbage_cursor_is_rejected() {
        assert!(Cursor::decode("not base64 !!").is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode("abc")).is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode("12|not-a-uuid")).is_err());
    }

    #[test]
    fn test_page_query_limit_is_clamped() {
        assert_eq!(PageQuery::default().limit(), DEFAULT_PAGE_SIZE);
        let q = PageQuery { cursor: None, limit: Some(0) };
        assert_eq!(q.limit(), 1);
        let q = PageQuery { cursor: None, limit: Some(10_000) };
        assert_eq!(q.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_empty_cursor_means_first_page() {
        let q = PageQuery { cursor: Some(String::new()), limit: None };
        assert_eq!(q.cursor().unwrap(), None);
    }

    #[test]
    fn test_same_cursor_returns_same_page() {
        let mut all = rows(7);
        all.sort_by_key(|r| (r.created_at, r.id));

        let first = page_after(&all, None, 3);
        let cursor = Cursor::decode(first.next_cursor.as_ref().unwrap()).unwrap();

        let a = page_after(&all, Some(cursor), 3);
        let b = page_after(&all, Some(cursor), 3);
        let ids_a: Vec<Uuid> = a.items.iter().map(|r| r.id).collect();
        let ids_b: Vec<Uuid> = b.items.iter().map(|r| r.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_walking_pages_visits_every_row_once() {
        let mut all = rows(10);
        all.sort_by_key(|r| (r.created_at, r.id));

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = page_after(&all, cursor, 3);
            seen.extend(page.items.iter().map(|r| r.id));
            match page.next_cursor {
                Some(next) => cursor = Some(Cursor::decode(&next).unwrap()),
                None => break,
            }
        }

        let expected: Vec<Uuid> = all.iter().map(|r| r.id).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_exact_fit_has_no_next_cursor() {
        let all = rows(3);
        let page = Page::from_overfetch(all, 3);
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }
}
