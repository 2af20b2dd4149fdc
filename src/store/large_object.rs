//! Paged binary objects stored alongside relational rows.
//!
//! An object is a row in `large_objects` plus its content split into
//! `PAGE_SIZE` pages in `large_object_pages`; only the last page may be
//! short. Readers and writers borrow the connection of the transaction they
//! were opened in, so they cannot outlive it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use rusqlite::{Connection, OptionalExtension, params};

use super::Deadline;
use crate::error::{Error, Result};

pub const PAGE_SIZE: usize = 8192;

pub type Oid = i64;

/// Allocates a new, empty object.
pub fn create(conn: &Connection) -> Result<Oid> {
    conn.execute("INSERT INTO large_objects DEFAULT VALUES", [])?;
    Ok(conn.last_insert_rowid())
}

/// Removes an object and all of its pages. Returns `false` if it did not exist.
pub fn unlink(conn: &Connection, oid: Oid) -> Result<bool> {
    conn.execute("DELETE FROM large_object_pages WHERE oid = ?1", params![oid])?;
    let rows = conn.execute("DELETE FROM large_objects WHERE oid = ?1", params![oid])?;
    Ok(rows > 0)
}

pub fn exists(conn: &Connection, oid: Oid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM large_objects WHERE oid = ?1",
            params![oid],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn require(conn: &Connection, oid: Oid) -> Result<()> {
    if !exists(conn, oid)? {
        return Err(Error::Database(rusqlite::Error::QueryReturnedNoRows));
    }
    Ok(())
}

fn tunnel(e: Error) -> io::Error {
    io::Error::other(e)
}

/// Sequential writer that replaces an object's content.
///
/// Bytes are buffered into whole pages; the trailing partial page is only
/// persisted by [`LargeObjectWriter::finish`].
pub struct LargeObjectWriter<'conn> {
    conn: &'conn Connection,
    deadline: Deadline,
    oid: Oid,
    pageno: i64,
    page: Vec<u8>,
    written: u64,
}

impl<'conn> LargeObjectWriter<'conn> {
    pub fn open(conn: &'conn Connection, oid: Oid, deadline: Deadline) -> Result<Self> {
        require(conn, oid)?;
        conn.execute("DELETE FROM large_object_pages WHERE oid = ?1", params![oid])?;
        Ok(Self {
            conn,
            deadline,
            oid,
            pageno: 0,
            page: Vec::with_capacity(PAGE_SIZE),
            written: 0,
        })
    }

    fn flush_page(&mut self) -> Result<()> {
        self.deadline.check()?;
        self.conn.execute(
            "INSERT INTO large_object_pages (oid, pageno, data) VALUES (?1, ?2, ?3)",
            params![self.oid, self.pageno, self.page],
        )?;
        self.pageno += 1;
        self.page.clear();
        Ok(())
    }

    /// Persists any buffered bytes and returns the object's total length.
    pub fn finish(mut self) -> Result<u64> {
        if !self.page.is_empty() {
            self.flush_page()?;
        }
        Ok(self.written)
    }
}

impl Write for LargeObjectWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let take = (PAGE_SIZE - self.page.len()).min(rest.len());
            self.page.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.page.len() == PAGE_SIZE {
                self.flush_page().map_err(tunnel)?;
            }
        }
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Random-access reader over an object's content.
pub struct LargeObjectReader<'conn> {
    conn: &'conn Connection,
    deadline: Deadline,
    oid: Oid,
    len: u64,
    pos: u64,
    cached: Option<(i64, Vec<u8>)>,
}

impl<'conn> LargeObjectReader<'conn> {
    pub fn open(conn: &'conn Connection, oid: Oid, deadline: Deadline) -> Result<Self> {
        require(conn, oid)?;
        let len: i64 = conn.query_row(
            "SELECT COALESCE(SUM(length(data)), 0) FROM large_object_pages WHERE oid = ?1",
            params![oid],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn,
            deadline,
            oid,
            len: len as u64,
            pos: 0,
            cached: None,
        })
    }

    #[must_use]
    pub fn oid(&self) -> Oid {
        self.oid
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn load_page(&mut self, pageno: i64) -> io::Result<&[u8]> {
        if self.cached.as_ref().is_none_or(|(cached, _)| *cached != pageno) {
            self.deadline.check().map_err(tunnel)?;
            let data: Option<Vec<u8>> = self
                .conn
                .query_row(
                    "SELECT data FROM large_object_pages WHERE oid = ?1 AND pageno = ?2",
                    params![self.oid, pageno],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| tunnel(e.into()))?;

            let data = data.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("large object {} is missing page {pageno}", self.oid),
                )
            })?;
            self.cached = Some((pageno, data));
        }

        Ok(self
            .cached
            .as_ref()
            .map(|(_, data)| data.as_slice())
            .unwrap_or_default())
    }
}

impl Read for LargeObjectReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }

        let page_size = PAGE_SIZE as u64;
        let pageno = (self.pos / page_size) as i64;
        let offset = (self.pos % page_size) as usize;

        let page = self.load_page(pageno)?;
        if offset >= page.len() {
            return Ok(0);
        }
        let n = (page.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&page[offset..offset + n]);

        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for LargeObjectReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.pos = target;
        Ok(target)
    }
}
