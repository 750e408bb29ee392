//! cursor - bounds-checked reader over a received byte buffer

use crate::{PfcpError, PfcpResult};
use bytes::Buf;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A read position over a byte slice.  Every read checks the remaining length first, so a
/// short buffer produces an error rather than a panic or a partial value.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, consumed: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn position(&self) -> usize {
        self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, needed: usize) -> PfcpResult<()> {
        if self.buf.len() < needed {
            return Err(PfcpError::BufferTooShort {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    fn advanced(&mut self, n: usize) {
        self.consumed += n;
    }

    pub fn read_u8(&mut self) -> PfcpResult<u8> {
        self.need(1)?;
        self.advanced(1);
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> PfcpResult<u16> {
        self.need(2)?;
        self.advanced(2);
        Ok(self.buf.get_u16())
    }

    pub fn read_u24(&mut self) -> PfcpResult<u32> {
        self.need(3)?;
        self.advanced(3);
        Ok(self.buf.get_uint(3) as u32)
    }

    pub fn read_u32(&mut self) -> PfcpResult<u32> {
        self.need(4)?;
        self.advanced(4);
        Ok(self.buf.get_u32())
    }

    /// 40 bit bitrate fields, TS29.244, 8.2.8.
    pub fn read_u40(&mut self) -> PfcpResult<u64> {
        self.need(5)?;
        self.advanced(5);
        Ok(self.buf.get_uint(5))
    }

    pub fn read_u64(&mut self) -> PfcpResult<u64> {
        self.need(8)?;
        self.advanced(8);
        Ok(self.buf.get_u64())
    }

    pub fn read_bytes(&mut self, n: usize) -> PfcpResult<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        self.advanced(n);
        Ok(head)
    }

    pub fn read_ipv4(&mut self) -> PfcpResult<Ipv4Addr> {
        Ok(Ipv4Addr::from(self.read_u32()?))
    }

    pub fn read_ipv6(&mut self) -> PfcpResult<Ipv6Addr> {
        self.need(16)?;
        self.advanced(16);
        Ok(Ipv6Addr::from(self.buf.get_u128()))
    }

    pub fn skip(&mut self, n: usize) -> PfcpResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Take everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.advanced(rest.len());
        self.buf = &[];
        rest
    }
}
