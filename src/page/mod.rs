//! 行页（Row Page）读写
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ row_count    (u32 LE)            │
//! │ first_key    (u64 LE)            │
//! │ raw_size     (u32 LE)            │
//! │ comp_size    (u32 LE)            │
//! │ payload      (encoded+compressed)│
//! │ CRC32        (u32 LE)            │  覆盖 header + payload
//! └──────────────────────────────────┘
//! ```
//!
//! payload 是按行、按列依次排列的值，每个值 = tag(u8) + 定长或变长数据。

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{Result, RowKey, TableError};
use crate::compression::{self, CompressionType};
use crate::field_type::Value;
use crate::geometry::Envelope;
use crate::row::Row;

/// 页头固定长度
pub const PAGE_HEADER_LEN: usize = 20;

const TAG_NULL:     u8 = 0;
const TAG_INT32:    u8 = 1;
const TAG_INT64:    u8 = 2;
const TAG_FLOAT64:  u8 = 3;
const TAG_BYTES:    u8 = 4;
const TAG_GEOMETRY: u8 = 5;

// ── 值编解码 ──────────────────────────────────────────────────────────────────

pub fn encode_value(out: &mut Vec<u8>, v: &Value) -> Result<()> {
    match v {
        Value::Null       => out.write_u8(TAG_NULL)?,
        Value::Int32(x)   => { out.write_u8(TAG_INT32)?;   out.write_i32::<LittleEndian>(*x)?; }
        Value::Int64(x)   => { out.write_u8(TAG_INT64)?;   out.write_i64::<LittleEndian>(*x)?; }
        Value::Float64(x) => { out.write_u8(TAG_FLOAT64)?; out.write_f64::<LittleEndian>(*x)?; }
        Value::Bytes(b)   => {
            let len = u32::try_from(b.len())
                .map_err(|_| TableError::Corrupt(format!("value too long: {} bytes", b.len())))?;
            out.write_u8(TAG_BYTES)?;
            out.write_u32::<LittleEndian>(len)?;
            out.extend_from_slice(b);
        }
        Value::Geometry(e) => {
            out.write_u8(TAG_GEOMETRY)?;
            for c in [e.min_x, e.min_y, e.max_x, e.max_y] {
                out.write_f64::<LittleEndian>(c)?;
            }
        }
    }
    Ok(())
}

pub fn decode_value(cur: &mut Cursor<&[u8]>) -> Result<Value> {
    let v = match cur.read_u8()? {
        TAG_NULL     => Value::Null,
        TAG_INT32    => Value::Int32(cur.read_i32::<LittleEndian>()?),
        TAG_INT64    => Value::Int64(cur.read_i64::<LittleEndian>()?),
        TAG_FLOAT64  => Value::Float64(cur.read_f64::<LittleEndian>()?),
        TAG_BYTES    => {
            let len = cur.read_u32::<LittleEndian>()? as usize;
            let mut buf = vec![0u8; len];
            cur.read_exact(&mut buf)?;
            Value::Bytes(buf)
        }
        TAG_GEOMETRY => {
            let min_x = cur.read_f64::<LittleEndian>()?;
            let min_y = cur.read_f64::<LittleEndian>()?;
            let max_x = cur.read_f64::<LittleEndian>()?;
            let max_y = cur.read_f64::<LittleEndian>()?;
            Value::Geometry(Envelope { min_x, min_y, max_x, max_y })
        }
        tag => return Err(TableError::Corrupt(format!("unknown value tag {tag}"))),
    };
    Ok(v)
}

// ── PageBuilder ───────────────────────────────────────────────────────────────

pub struct PageBuilder {
    pub first_key: RowKey,
    compression:   CompressionType,
    row_count:     u32,
    raw:           Vec<u8>,
}

impl PageBuilder {
    pub fn new(first_key: RowKey, compression: CompressionType) -> Self {
        Self { first_key, compression, row_count: 0, raw: Vec::new() }
    }

    pub fn add(&mut self, values: &[Value]) -> Result<()> {
        for v in values {
            encode_value(&mut self.raw, v)?;
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn len(&self)      -> usize { self.row_count as usize }
    pub fn is_empty(&self) -> bool  { self.row_count == 0 }

    /// 序列化为页字节（encode → compress → 加 header+CRC）
    pub fn build(self) -> Result<Vec<u8>> {
        let compressed = compression::compress(&self.raw, self.compression, self.first_key)?;

        let mut page = Vec::with_capacity(PAGE_HEADER_LEN + compressed.len() + 4);
        page.write_u32::<LittleEndian>(self.row_count)?;
        page.write_u64::<LittleEndian>(self.first_key)?;
        page.write_u32::<LittleEndian>(self.raw.len() as u32)?;
        page.write_u32::<LittleEndian>(compressed.len() as u32)?;
        page.extend_from_slice(&compressed);

        let crc = crc32fast::hash(&page);
        page.write_u32::<LittleEndian>(crc)?;
        Ok(page)
    }
}

// ── PageHeader / PageDecoder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub row_count: u32,
    pub first_key: RowKey,
    pub raw_size:  u32,
    pub comp_size: u32,
}

impl PageHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PAGE_HEADER_LEN {
            return Err(TableError::Corrupt("page header too short".into()));
        }
        let mut cur = Cursor::new(data);
        Ok(Self {
            row_count: cur.read_u32::<LittleEndian>()?,
            first_key: cur.read_u64::<LittleEndian>()?,
            raw_size:  cur.read_u32::<LittleEndian>()?,
            comp_size: cur.read_u32::<LittleEndian>()?,
        })
    }

    /// 整页长度（含 header 与 CRC）
    pub fn page_len(&self) -> usize {
        PAGE_HEADER_LEN + self.comp_size as usize + 4
    }
}

pub struct PageDecoder;

impl PageDecoder {
    /// 校验 CRC 并解出整页的行
    pub fn decode(
        data:        &[u8],
        compression: CompressionType,
        num_columns: usize,
    ) -> Result<Vec<Row>> {
        let header = PageHeader::parse(data)?;
        if data.len() != header.page_len() {
            return Err(TableError::Corrupt(format!(
                "page length {} != expected {}", data.len(), header.page_len()
            )));
        }
        let crc_pos    = data.len() - 4;
        let stored_crc = u32::from_le_bytes([
            data[crc_pos], data[crc_pos + 1], data[crc_pos + 2], data[crc_pos + 3],
        ]);
        if crc32fast::hash(&data[..crc_pos]) != stored_crc {
            return Err(TableError::ChecksumMismatch);
        }

        let raw = compression::decompress(
            &data[PAGE_HEADER_LEN..crc_pos], compression, header.raw_size, header.first_key,
        )?;
        let mut cur  = Cursor::new(raw.as_slice());
        let mut rows = Vec::with_capacity(header.row_count as usize);
        for i in 0..header.row_count as u64 {
            let mut values = Vec::with_capacity(num_columns);
            for _ in 0..num_columns {
                values.push(decode_value(&mut cur)?);
            }
            rows.push(Row::new(header.first_key + i, values));
        }
        Ok(rows)
    }
}
