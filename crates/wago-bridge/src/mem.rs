//! Typed access to the guest's linear memory.
//!
//! A [`Mem`] is a short-lived window over the memory bytes, borrowed for
//! one handler step. It is never cached: the guest can grow or reallocate
//! its memory (signaled through `runtime.resetMemoryDataView`), so every
//! handler re-borrows from the live `wasmtime::Memory` handle. All
//! multi-byte accesses are little-endian, per the guest ABI.
//!
//! 64-bit integers cross the boundary as two 32-bit words (low, high);
//! values that round-trip through the host's f64 number domain lose
//! precision beyond 2^53, which matches the numeric domain used
//! everywhere else in the bridge.

use crate::error::BridgeError;

/// Byte-addressable view over guest linear memory.
pub struct Mem<'a> {
    data: &'a mut [u8],
}

impl<'a> Mem<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check(&self, addr: u64, len: u64) -> Result<usize, BridgeError> {
        let end = addr.checked_add(len).ok_or(BridgeError::OutOfBounds { addr, len })?;
        if end > self.data.len() as u64 {
            return Err(BridgeError::OutOfBounds { addr, len });
        }
        Ok(addr as usize)
    }

    /// Immutable byte range described by `(addr, len)`.
    pub fn slice(&self, addr: u64, len: u64) -> Result<&[u8], BridgeError> {
        let start = self.check(addr, len)?;
        Ok(&self.data[start..start + len as usize])
    }

    /// Mutable byte range described by `(addr, len)`.
    pub fn slice_mut(&mut self, addr: u64, len: u64) -> Result<&mut [u8], BridgeError> {
        let start = self.check(addr, len)?;
        Ok(&mut self.data[start..start + len as usize])
    }

    pub fn get_u8(&self, addr: u64) -> Result<u8, BridgeError> {
        let start = self.check(addr, 1)?;
        Ok(self.data[start])
    }

    pub fn set_u8(&mut self, addr: u64, value: u8) -> Result<(), BridgeError> {
        let start = self.check(addr, 1)?;
        self.data[start] = value;
        Ok(())
    }

    pub fn get_u32(&self, addr: u64) -> Result<u32, BridgeError> {
        let start = self.check(addr, 4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[start..start + 4]);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn set_u32(&mut self, addr: u64, value: u32) -> Result<(), BridgeError> {
        let start = self.check(addr, 4)?;
        self.data[start..start + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn get_i32(&self, addr: u64) -> Result<i32, BridgeError> {
        Ok(self.get_u32(addr)? as i32)
    }

    pub fn set_i32(&mut self, addr: u64, value: i32) -> Result<(), BridgeError> {
        self.set_u32(addr, value as u32)
    }

    /// Read a 64-bit value stored as (low u32, high u32).
    pub fn get_u64(&self, addr: u64) -> Result<u64, BridgeError> {
        let low = self.get_u32(addr)? as u64;
        let high = self.get_u32(addr + 4)? as u64;
        Ok(low | (high << 32))
    }

    /// Write a 64-bit value as (low u32, high u32).
    pub fn set_u64(&mut self, addr: u64, value: u64) -> Result<(), BridgeError> {
        self.set_u32(addr, value as u32)?;
        self.set_u32(addr + 4, (value >> 32) as u32)
    }

    pub fn get_i64(&self, addr: u64) -> Result<i64, BridgeError> {
        Ok(self.get_u64(addr)? as i64)
    }

    pub fn set_i64(&mut self, addr: u64, value: i64) -> Result<(), BridgeError> {
        self.set_u64(addr, value as u64)
    }

    pub fn get_f64(&self, addr: u64) -> Result<f64, BridgeError> {
        Ok(f64::from_bits(self.get_u64(addr)?))
    }

    pub fn set_f64(&mut self, addr: u64, value: f64) -> Result<(), BridgeError> {
        self.set_u64(addr, value.to_bits())
    }

    /// Read the `(ptr, len)` slice header the guest lays out for byte
    /// slices and strings.
    pub fn slice_header(&self, addr: u64) -> Result<(u64, u64), BridgeError> {
        Ok((self.get_u64(addr)?, self.get_u64(addr + 8)?))
    }

    /// Zero-copy view of a guest byte slice described at `addr`.
    pub fn load_slice(&mut self, addr: u64) -> Result<&mut [u8], BridgeError> {
        let (ptr, len) = self.slice_header(addr)?;
        self.slice_mut(ptr, len)
    }

    /// UTF-8 decode of the (ptr, len) string header at `addr`. Invalid
    /// sequences decode lossily, matching the host's text decoder.
    pub fn load_string(&self, addr: u64) -> Result<String, BridgeError> {
        let (ptr, len) = self.slice_header(addr)?;
        Ok(String::from_utf8_lossy(self.slice(ptr, len)?).into_owned())
    }

    /// Copy host bytes into a pre-sized guest range.
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), BridgeError> {
        self.slice_mut(addr, bytes.len() as u64)?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_with(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn u64_splits_into_low_high_words() {
        let mut buf = mem_with(64);
        let mut mem = Mem::new(&mut buf);
        mem.set_u64(8, 0x1_2345_6789).unwrap();
        assert_eq!(mem.get_u32(8).unwrap(), 0x2345_6789);
        assert_eq!(mem.get_u32(12).unwrap(), 0x1);
        assert_eq!(mem.get_u64(8).unwrap(), 0x1_2345_6789);

        mem.set_i64(16, -2).unwrap();
        assert_eq!(mem.get_i64(16).unwrap(), -2);
    }

    #[test]
    fn string_round_trip_through_guest_memory() {
        for input in ["", "hello", "héllo wörld", "日本語"] {
            let mut buf = mem_with(256);
            let mut mem = Mem::new(&mut buf);
            mem.write_bytes(32, input.as_bytes()).unwrap();
            mem.set_u64(8, 32).unwrap();
            mem.set_u64(16, input.len() as u64).unwrap();
            assert_eq!(mem.load_string(8).unwrap(), input);
        }
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut buf = mem_with(16);
        let mut mem = Mem::new(&mut buf);
        assert!(mem.get_u32(14).is_err());
        assert!(mem.set_u64(12, 1).is_err());
        assert!(mem.slice(8, 9).is_err());
        // Address arithmetic must not wrap.
        assert!(mem.slice(u64::MAX, 2).is_err());
    }

    #[test]
    fn slice_views_alias_the_buffer() {
        let mut buf = mem_with(64);
        let mut mem = Mem::new(&mut buf);
        mem.set_u64(0, 40).unwrap(); // ptr
        mem.set_u64(8, 4).unwrap(); // len
        mem.load_slice(0).unwrap().copy_from_slice(b"abcd");
        assert_eq!(mem.slice(40, 4).unwrap(), b"abcd");
    }
}
