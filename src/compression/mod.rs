//! 页负载压缩/解压（LZ4 / None），错误信息带上页首行键

use crate::common::{Result, RowKey, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lz4,
}

impl CompressionType {
    pub fn tag(self) -> u8 {
        match self { Self::None => 0, Self::Lz4 => 1 }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag { 0 => Some(Self::None), 1 => Some(Self::Lz4), _ => None }
    }
}

/// 压缩一页的行数据；`page` 为页首行键，只用于错误信息
pub fn compress(raw: &[u8], codec: CompressionType, page: RowKey) -> Result<Vec<u8>> {
    if u32::try_from(raw.len()).is_err() {
        return Err(TableError::Compression(format!("page {page}: {} bytes exceed u32", raw.len())));
    }
    match codec {
        CompressionType::None => Ok(raw.to_vec()),
        CompressionType::Lz4  => lz4::block::compress(raw, None, false)
            .map_err(|e| TableError::Compression(format!("page {page}: {e}"))),
    }
}

/// 解压一页，结果长度必须等于页头记录的 `raw_size`
pub fn decompress(
    packed:   &[u8],
    codec:    CompressionType,
    raw_size: u32,
    page:     RowKey,
) -> Result<Vec<u8>> {
    let raw = match codec {
        CompressionType::None => packed.to_vec(),
        CompressionType::Lz4  => {
            let expected = i32::try_from(raw_size).map_err(|_| {
                TableError::Corrupt(format!("page {page}: raw size {raw_size} too large"))
            })?;
            lz4::block::decompress(packed, Some(expected))
                .map_err(|e| TableError::Compression(format!("page {page}: {e}")))?
        }
    };
    if raw.len() != raw_size as usize {
        return Err(TableError::Corrupt(format!(
            "page {page}: decoded {} bytes, header says {raw_size}", raw.len()
        )));
    }
    Ok(raw)
}
