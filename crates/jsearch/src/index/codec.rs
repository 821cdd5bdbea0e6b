// Copyright 2025 HyperZoekt Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, Write};

// LEB128-style unsigned varint.
pub(crate) fn write_var_u32<W: Write>(w: &mut W, mut v: u32) -> io::Result<()> {
    let mut buf = [0u8; 5];
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = (v as u8 & 0x7F) | 0x80;
        v >>= 7;
        i += 1;
    }
    buf[i] = v as u8;
    i += 1;
    w.write_all(&buf[..i])
}

pub(crate) fn read_var_u32(buf: &[u8], off: &mut usize) -> Option<u32> {
    let mut shift = 0u32;
    let mut out: u32 = 0;
    loop {
        let b = *buf.get(*off)?;
        *off += 1;
        out |= ((b & 0x7F) as u32) << shift;
        if (b & 0x80) == 0 {
            return Some(out);
        }
        shift += 7;
        if shift >= 35 {
            return None;
        }
    }
}

/// Write a sorted id list as count followed by deltas.
pub(crate) fn write_postings<W: Write>(w: &mut W, ids: &[u32]) -> io::Result<()> {
    write_var_u32(w, ids.len() as u32)?;
    let mut prev = 0u32;
    for id in ids {
        write_var_u32(w, id.wrapping_sub(prev))?;
        prev = *id;
    }
    Ok(())
}

pub(crate) fn read_postings(buf: &[u8], off: &mut usize) -> Option<Vec<u32>> {
    let n = read_var_u32(buf, off)? as usize;
    let mut out = Vec::with_capacity(n.min(buf.len()));
    let mut prev = 0u32;
    for _ in 0..n {
        prev = prev.wrapping_add(read_var_u32(buf, off)?);
        out.push(prev);
    }
    Some(out)
}

/// Skip a posting list without materializing it.
pub(crate) fn skip_postings(buf: &[u8], off: &mut usize) -> Option<u32> {
    let n = read_var_u32(buf, off)?;
    for _ in 0..n {
        read_var_u32(buf, off)?;
    }
    Some(n)
}

pub(crate) fn write_str16<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let b = s.as_bytes();
    if b.len() > u16::MAX as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "string too long"));
    }
    w.write_all(&(b.len() as u16).to_le_bytes())?;
    w.write_all(b)
}

/// Bounds-checked little-endian reader over a mapped file.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pub(crate) off: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8], off: usize) -> Self {
        Self { buf, off }
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.off.checked_add(n)?;
        let out = self.buf.get(self.off..end)?;
        self.off = end;
        Some(out)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.bytes(1).map(|b| b[0])
    }

    pub(crate) fn u16(&mut self) -> Option<u16> {
        self.bytes(2)?.try_into().ok().map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.bytes(4)?.try_into().ok().map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        self.bytes(8)?.try_into().ok().map(u64::from_le_bytes)
    }

    pub(crate) fn var(&mut self) -> Option<u32> {
        read_var_u32(self.buf, &mut self.off)
    }

    pub(crate) fn str16(&mut self) -> Option<&'a str> {
        let n = self.u16()? as usize;
        std::str::from_utf8(self.bytes(n)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        let mut buf = Vec::new();
        for v in [0u32, 1, 127, 128, 300, u32::MAX] {
            write_var_u32(&mut buf, v).unwrap();
        }
        let mut off = 0;
        for v in [0u32, 1, 127, 128, 300, u32::MAX] {
            assert_eq!(read_var_u32(&buf, &mut off), Some(v));
        }
        assert_eq!(off, buf.len());
        assert_eq!(read_var_u32(&buf, &mut off), None);
    }

    #[test]
    fn postings_are_delta_encoded() {
        let mut buf = Vec::new();
        write_postings(&mut buf, &[3, 4, 1000]).unwrap();
        // count, 3, 1, 996 (two bytes)
        assert_eq!(buf.len(), 5);
        let mut off = 0;
        assert_eq!(read_postings(&buf, &mut off), Some(vec![3, 4, 1000]));
        let mut off = 0;
        assert_eq!(skip_postings(&buf, &mut off), Some(3));
        assert_eq!(off, buf.len());
    }

    #[test]
    fn cursor_rejects_truncation() {
        let mut c = Cursor::new(&[1, 0, 5], 0);
        assert_eq!(c.u16(), Some(1));
        assert_eq!(c.u16(), None);
        let mut c = Cursor::new(&[4, 0, b'a', b'b'], 0);
        assert_eq!(c.str16(), None);
    }
}
