//! store/page — on-disk page header and leaf record layout.
//!
//! Header (32 B, LE):
//!   [magic4 "PSPG"][version u16][kind u16][page_id u64]
//!   [count u32][overflow u32][used u32][crc32 u32]
//!
//! `used` is the record-byte length of the page: for plain leaves it
//! stays within the payload area, for an overflow span it is the total
//! record length continuing into the owned slots. The CRC covers the
//! header (with the crc field zeroed) plus the first slot's payload.
//!
//! Leaf records are packed back to back:
//! [klen u16][vlen u32][seq u64][key][val]. `seq` is a store-wide
//! monotonic write sequence; duplicate keys resolve to the highest
//! sequence, independent of which page a record landed on.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::engine::PageKind;

pub const PAGE_MAGIC: &[u8; 4] = b"PSPG";
pub const PAGE_VERSION: u16 = 1;

pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_KIND: usize = 6;
pub const OFF_PAGE_ID: usize = 8;
pub const OFF_COUNT: usize = 16;
pub const OFF_OVERFLOW: usize = 20;
pub const OFF_USED: usize = 24;
pub const OFF_CRC: usize = 28;
pub const PAGE_HDR_SIZE: usize = 32;

/// Per-record prefix: klen u16 + vlen u32 + seq u64.
pub const REC_HDR: usize = 14;

pub const REC_OFF_KLEN: usize = 0;
pub const REC_OFF_VLEN: usize = 2;
pub const REC_OFF_SEQ: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub page_id: u64,
    pub kind: PageKind,
    pub count: u32,
    pub overflow: u32,
    pub used: u32,
}

/// Stamp a full header (including CRC) onto a page buffer.
pub fn header_write(buf: &mut [u8], hdr: &PageHeader) {
    buf[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(PAGE_MAGIC);
    LittleEndian::write_u16(&mut buf[OFF_VERSION..], PAGE_VERSION);
    LittleEndian::write_u16(&mut buf[OFF_KIND..], hdr.kind.code());
    LittleEndian::write_u64(&mut buf[OFF_PAGE_ID..], hdr.page_id);
    LittleEndian::write_u32(&mut buf[OFF_COUNT..], hdr.count);
    LittleEndian::write_u32(&mut buf[OFF_OVERFLOW..], hdr.overflow);
    LittleEndian::write_u32(&mut buf[OFF_USED..], hdr.used);
    update_crc(buf);
}

/// Recompute and store the CRC for a page buffer.
pub fn update_crc(buf: &mut [u8]) {
    let crc = compute_crc(buf);
    LittleEndian::write_u32(&mut buf[OFF_CRC..], crc);
}

fn compute_crc(buf: &[u8]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(&buf[..OFF_CRC]);
    h.update(&buf[PAGE_HDR_SIZE..]);
    h.finalize()
}

/// Parse and validate a page header read from disk.
pub fn header_read(buf: &[u8], expected_id: u64) -> Result<PageHeader> {
    if buf.len() < PAGE_HDR_SIZE {
        return Err(anyhow!("page buffer too small ({} B)", buf.len()));
    }
    if &buf[OFF_MAGIC..OFF_MAGIC + 4] != PAGE_MAGIC {
        return Err(anyhow!("bad page magic at id {}", expected_id));
    }
    let version = LittleEndian::read_u16(&buf[OFF_VERSION..]);
    if version != PAGE_VERSION {
        return Err(anyhow!(
            "unsupported page version {} at id {}",
            version,
            expected_id
        ));
    }
    let kind_code = LittleEndian::read_u16(&buf[OFF_KIND..]);
    let kind = PageKind::from_code(kind_code)
        .ok_or_else(|| anyhow!("unknown page kind {} at id {}", kind_code, expected_id))?;
    let page_id = LittleEndian::read_u64(&buf[OFF_PAGE_ID..]);
    if page_id != expected_id {
        return Err(anyhow!(
            "page id mismatch: header says {}, slot is {}",
            page_id,
            expected_id
        ));
    }
    let stored = LittleEndian::read_u32(&buf[OFF_CRC..]);
    let actual = compute_crc(buf);
    if stored != actual {
        return Err(anyhow!(
            "page crc mismatch at id {} (stored {:08x}, actual {:08x})",
            expected_id,
            stored,
            actual
        ));
    }
    Ok(PageHeader {
        page_id,
        kind,
        count: LittleEndian::read_u32(&buf[OFF_COUNT..]),
        overflow: LittleEndian::read_u32(&buf[OFF_OVERFLOW..]),
        used: LittleEndian::read_u32(&buf[OFF_USED..]),
    })
}

/// One decoded leaf record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub seq: u64,
    pub key: Vec<u8>,
    pub val: Vec<u8>,
}

/// Append one record to a record byte stream.
pub fn rec_append(dst: &mut Vec<u8>, key: &[u8], val: &[u8], seq: u64) {
    let mut hdr = [0u8; REC_HDR];
    LittleEndian::write_u16(&mut hdr[REC_OFF_KLEN..], key.len() as u16);
    LittleEndian::write_u32(&mut hdr[REC_OFF_VLEN..], val.len() as u32);
    LittleEndian::write_u64(&mut hdr[REC_OFF_SEQ..], seq);
    dst.extend_from_slice(&hdr);
    dst.extend_from_slice(key);
    dst.extend_from_slice(val);
}

/// Total encoded size of one record.
pub fn rec_size(key: &[u8], val: &[u8]) -> usize {
    REC_HDR + key.len() + val.len()
}

/// Decode all records from a record byte stream of `used` bytes.
pub fn rec_decode_all(data: &[u8], used: usize) -> Result<Vec<Record>> {
    if used > data.len() {
        return Err(anyhow!(
            "record area truncated: used={} data={}",
            used,
            data.len()
        ));
    }
    let mut out = Vec::new();
    let mut off = 0usize;
    while off < used {
        if used - off < REC_HDR {
            return Err(anyhow!("trailing garbage in record area at offset {}", off));
        }
        let klen = LittleEndian::read_u16(&data[off + REC_OFF_KLEN..]) as usize;
        let vlen = LittleEndian::read_u32(&data[off + REC_OFF_VLEN..]) as usize;
        let seq = LittleEndian::read_u64(&data[off + REC_OFF_SEQ..]);
        off += REC_HDR;
        if off + klen + vlen > used {
            return Err(anyhow!("record overruns page at offset {}", off));
        }
        out.push(Record {
            seq,
            key: data[off..off + klen].to_vec(),
            val: data[off + klen..off + klen + vlen].to_vec(),
        });
        off += klen + vlen;
    }
    Ok(out)
}
