//! Raw image bytes kept alongside attendance: every processed attendance
//! photo and every enrollment snapshot.

use crate::Result;
use rusqlite::{params, Connection};

pub struct ImageStore<'a> {
    conn: &'a Connection,
}

impl<'a> ImageStore<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Store `bytes` under `name`, returning the row id.
    pub fn insert(&self, name: &str, bytes: &[u8]) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO images (name, image) VALUES (?1, ?2)",
            params![name, bytes],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(name, id, size = bytes.len(), "image stored");
        Ok(id)
    }

    /// Most recently stored bytes for `name`.
    pub fn latest(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT image FROM images WHERE name = ?1 ORDER BY id DESC LIMIT 1")?;
        let mut rows = stmt.query(params![name])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::Store;
    use chrono::FixedOffset;

    #[test]
    fn test_insert_and_read_back_latest() {
        let store = Store::open_in_memory(FixedOffset::east_opt(0).unwrap()).unwrap();
        let images = store.images();
        images.insert("class.jpg", &[1, 2, 3]).unwrap();
        images.insert("class.jpg", &[4, 5]).unwrap();

        assert_eq!(images.count().unwrap(), 2);
        assert_eq!(images.latest("class.jpg").unwrap(), Some(vec![4, 5]));
        assert_eq!(images.latest("other.jpg").unwrap(), None);
    }
}
