//! 行文件（Row File）读写
//!
//! 文件格式：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC  (8 bytes) "FTROWS\0\0"     │
//! │  Version(4 bytes) = 1              │
//! │  compression (u8)                  │
//! │  page_rows   (u32)                 │
//! │  num_columns (u32)                 │
//! │    [name_len u16, name, type u8]   │
//! ├────────────────────────────────────┤
//! │  PAGES                             │
//! │    [Row Page 0]                    │ ← LZ4 + CRC32，见 page 模块
//! │    [Row Page 1]                    │
//! │    ...                             │
//! ├────────────────────────────────────┤
//! │  FOOTER                            │
//! │    num_rows  (u64)                 │
//! │    num_pages (u32)                 │
//! │    page offsets (u64 × num_pages)  │
//! │    Footer CRC32  (4 bytes)         │
//! │    Footer length (4 bytes)         │
//! │    MAGIC         (8 bytes)         │
//! └────────────────────────────────────┘
//! ```
//!
//! 除最后一页外，每页恰好 `page_rows` 行，因此行键可以直接换算成页号。

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{KeyRange, Result, RowKey, TableError};
use crate::compression::CompressionType;
use crate::driver::{clamp_range, FileDriver, RowCursor};
use crate::field_type::{Column, ColumnType, Value};
use crate::page::{PageBuilder, PageDecoder, PageHeader, PAGE_HEADER_LEN};
use crate::row::Row;

const MAGIC: &[u8; 8] = b"FTROWS\0\0";
const VERSION: u32     = 1;
const TAIL_LEN: u64    = 16;
/// magic + version + compression + page_rows + num_columns
const HEADER_LEN: u64  = 21;
/// 每列至少占 name_len(2) + type(1)
const MIN_COLUMN_LEN: u64 = 3;

/// 每页默认行数
pub const DEFAULT_PAGE_ROWS: u32 = 1024;

// ── RowFileWriter ─────────────────────────────────────────────────────────────

pub struct RowFileWriter<W: Write> {
    writer:       W,
    columns:      Vec<Column>,
    compression:  CompressionType,
    page_rows:    u32,
    current:      PageBuilder,
    page_offsets: Vec<u64>,
    pos:          u64,
    num_rows:     u64,
}

impl<W: Write> RowFileWriter<W> {
    /// 写入文件头，之后逐行追加
    pub fn new(writer: W, columns: Vec<Column>) -> Result<Self> {
        Self::with_options(writer, columns, DEFAULT_PAGE_ROWS, CompressionType::Lz4)
    }

    pub fn with_options(
        mut writer:  W,
        columns:     Vec<Column>,
        page_rows:   u32,
        compression: CompressionType,
    ) -> Result<Self> {
        let page_rows = page_rows.max(1);
        let mut header = Vec::new();
        header.extend_from_slice(MAGIC);
        header.write_u32::<LittleEndian>(VERSION)?;
        header.write_u8(compression.tag())?;
        header.write_u32::<LittleEndian>(page_rows)?;
        header.write_u32::<LittleEndian>(columns.len() as u32)?;
        for c in &columns {
            let name = c.name.as_bytes();
            let len = u16::try_from(name.len())
                .map_err(|_| TableError::Corrupt(format!("column name too long: {}", c.name)))?;
            header.write_u16::<LittleEndian>(len)?;
            header.extend_from_slice(name);
            header.write_u8(c.column_type.tag())?;
        }
        writer.write_all(&header)?;

        Ok(Self {
            writer, columns, compression, page_rows,
            current:      PageBuilder::new(1, compression),
            page_offsets: Vec::new(),
            pos:          header.len() as u64,
            num_rows:     0,
        })
    }

    /// 追加一行，`values` 的长度必须等于列数
    pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(TableError::Corrupt(format!(
                "row has {} values, file has {} columns", values.len(), self.columns.len()
            )));
        }
        self.current.add(values)?;
        self.num_rows += 1;
        if self.current.len() >= self.page_rows as usize {
            self.flush_page()?;
        }
        Ok(())
    }

    fn flush_page(&mut self) -> Result<()> {
        let next  = PageBuilder::new(self.num_rows + 1, self.compression);
        let bytes = std::mem::replace(&mut self.current, next).build()?;
        self.writer.write_all(&bytes)?;
        self.page_offsets.push(self.pos);
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// 写出最后一页与 Footer，返回文件总字节数
    pub fn finish(mut self) -> Result<u64> {
        if !self.current.is_empty() {
            self.flush_page()?;
        }

        let mut footer = Vec::with_capacity(12 + self.page_offsets.len() * 8);
        footer.write_u64::<LittleEndian>(self.num_rows)?;
        footer.write_u32::<LittleEndian>(self.page_offsets.len() as u32)?;
        for off in &self.page_offsets {
            footer.write_u64::<LittleEndian>(*off)?;
        }
        let crc = crc32fast::hash(&footer);

        self.writer.write_all(&footer)?;
        self.writer.write_u32::<LittleEndian>(crc)?;
        self.writer.write_u32::<LittleEndian>(footer.len() as u32)?;
        self.writer.write_all(MAGIC)?;
        self.writer.flush()?;
        Ok(self.pos + footer.len() as u64 + TAIL_LEN)
    }

    pub fn num_rows(&self) -> u64 { self.num_rows }
}

// ── RowFileDriver ─────────────────────────────────────────────────────────────

/// 行文件驱动：只在内存中保留文件头与页偏移，读页时按需解码
///
/// 读页使用定位读，多个游标并发读取时只共享读锁；`close` 取写锁。
pub struct RowFileDriver {
    path:         PathBuf,
    file:         RwLock<Option<File>>,
    columns:      Vec<Column>,
    compression:  CompressionType,
    page_rows:    u32,
    num_rows:     u64,
    page_offsets: Vec<u64>,
    /// 页区域结束位置（Footer 起点）
    data_end:     u64,
}

impl RowFileDriver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();

        // ── 文件头 ────────────────────────────────────────────────────────────
        let mut r = BufReader::new(&mut file);
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(TableError::Corrupt("invalid row file magic".into()));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(TableError::Corrupt(format!("unsupported row file version {version}")));
        }
        let compression = CompressionType::from_tag(r.read_u8()?)
            .ok_or_else(|| TableError::Corrupt("unknown compression".into()))?;
        let page_rows   = r.read_u32::<LittleEndian>()?;
        if page_rows == 0 {
            return Err(TableError::Corrupt("page_rows is 0".into()));
        }
        let num_columns = r.read_u32::<LittleEndian>()?;
        if num_columns as u64 * MIN_COLUMN_LEN > len.saturating_sub(HEADER_LEN) {
            return Err(TableError::Corrupt(format!("{num_columns} columns do not fit in {len} bytes")));
        }
        let mut columns = Vec::with_capacity(num_columns as usize);
        for i in 0..num_columns {
            let name_len = r.read_u16::<LittleEndian>()? as usize;
            let mut name = vec![0u8; name_len];
            r.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| TableError::Corrupt("column name is not UTF-8".into()))?;
            let column_type = ColumnType::from_tag(r.read_u8()?)
                .ok_or_else(|| TableError::Corrupt(format!("unknown type for column {name}")))?;
            columns.push(Column::new(&name, column_type).at(i as i32));
        }
        drop(r);

        // ── FOOTER ────────────────────────────────────────────────────────────
        if len < TAIL_LEN {
            return Err(TableError::Corrupt("row file too short".into()));
        }
        file.seek(SeekFrom::Start(len - TAIL_LEN))?;
        let footer_crc = file.read_u32::<LittleEndian>()?;
        let footer_len = file.read_u32::<LittleEndian>()? as u64;
        file.read_exact(&mut magic)?;
        if &magic != MAGIC || footer_len + TAIL_LEN > len {
            return Err(TableError::Corrupt("invalid row file tail".into()));
        }
        let data_end = len - TAIL_LEN - footer_len;
        let mut footer = vec![0u8; footer_len as usize];
        file.seek(SeekFrom::Start(data_end))?;
        file.read_exact(&mut footer)?;
        if crc32fast::hash(&footer) != footer_crc {
            return Err(TableError::ChecksumMismatch);
        }

        let mut cur   = Cursor::new(footer.as_slice());
        let num_rows  = cur.read_u64::<LittleEndian>()?;
        let num_pages = cur.read_u32::<LittleEndian>()?;
        let mut page_offsets = Vec::with_capacity(num_pages as usize);
        for _ in 0..num_pages {
            page_offsets.push(cur.read_u64::<LittleEndian>()?);
        }

        tracing::debug!(
            path = %path.display(), rows = num_rows, pages = num_pages,
            "opened row file"
        );
        Ok(Self {
            path,
            file: RwLock::new(Some(file)),
            columns, compression, page_rows, num_rows, page_offsets, data_end,
        })
    }

    fn page_of(&self, key: RowKey) -> usize {
        ((key - 1) / self.page_rows as u64) as usize
    }

    /// 读取并解码第 `page_idx` 页
    fn read_page(&self, page_idx: usize) -> Result<Vec<Row>> {
        let offset = *self.page_offsets.get(page_idx)
            .ok_or_else(|| TableError::Internal(format!("page {page_idx} out of range")))?;

        let guard = self.file.read().unwrap();
        let file = guard.as_ref().ok_or(TableError::SourceClosed)?;
        let mut data = vec![0u8; PAGE_HEADER_LEN];
        read_exact_at(file, &mut data, offset)?;
        let header = PageHeader::parse(&data)?;
        if offset + header.page_len() as u64 > self.data_end {
            return Err(TableError::Corrupt(format!(
                "page {page_idx} at {offset} runs past the footer ({} bytes)", header.page_len()
            )));
        }
        data.resize(header.page_len(), 0);
        read_exact_at(file, &mut data[PAGE_HEADER_LEN..], offset + PAGE_HEADER_LEN as u64)?;
        drop(guard);

        PageDecoder::decode(&data, self.compression, self.columns.len())
    }
}

impl FileDriver for RowFileDriver {
    fn columns(&self) -> &[Column] { &self.columns }

    fn row_count(&self) -> u64 { self.num_rows }

    fn get_row(&self, key: RowKey) -> Result<Row> {
        if key == 0 || key > self.num_rows {
            return Err(TableError::RowNotFound(key));
        }
        self.read_page(self.page_of(key))?
            .into_iter()
            .find(|r| r.key == key)
            .ok_or(TableError::RowNotFound(key))
    }

    fn open_cursor(&self, range: KeyRange) -> Result<RowCursor<'_>> {
        if self.file.read().unwrap().is_none() {
            return Err(TableError::SourceClosed);
        }
        let Some((first, last)) = clamp_range(range, self.num_rows) else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new(PageCursor {
            driver:    self,
            next_page: self.page_of(first),
            last_page: self.page_of(last),
            first, last,
            buffered:  Vec::new().into_iter(),
        }))
    }

    fn close(&self) -> Result<()> {
        if self.file.write().unwrap().take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed row file");
        }
        Ok(())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0;
    while done < buf.len() {
        let n = file.seek_read(&mut buf[done..], offset + done as u64)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short page read"));
        }
        done += n;
    }
    Ok(())
}

// ── PageCursor ────────────────────────────────────────────────────────────────

/// 逐页解码的游标，内存中最多保留一页
struct PageCursor<'a> {
    driver:    &'a RowFileDriver,
    next_page: usize,
    last_page: usize,
    first:     RowKey,
    last:      RowKey,
    buffered:  std::vec::IntoIter<Row>,
}

impl Iterator for PageCursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffered.next() {
                if row.key < self.first { continue; }
                if row.key > self.last  { return None; }
                return Some(Ok(row));
            }
            if self.next_page > self.last_page {
                return None;
            }
            match self.driver.read_page(self.next_page) {
                Ok(rows) => {
                    self.buffered = rows.into_iter();
                    self.next_page += 1;
                }
                Err(e) => {
                    self.next_page = self.last_page + 1;
                    return Some(Err(e));
                }
            }
        }
    }
}
