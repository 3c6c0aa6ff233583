//! Owned and borrowed byte containers backing the container parser.
//!
//! Three modes:
//! - **owned growable** — capacity doubles on growth, never shrinks
//!   implicitly;
//! - **owned fixed** — takes over an existing allocation;
//! - **view** — a non-owning window into memory the caller keeps alive.
//!   Views refuse every mutating operation.

use crate::error::{Result, ShowError};

#[derive(Debug, Clone)]
enum Repr<'a> {
    Owned(Vec<u8>),
    View(&'a [u8]),
}

/// A byte container with explicit ownership semantics.
#[derive(Debug, Clone)]
pub struct Buffer<'a> {
    repr: Repr<'a>,
}

impl Buffer<'static> {
    /// Allocate an owned, zero-filled buffer of `len` bytes.
    ///
    /// At least one byte of capacity is reserved even for `len == 0`.
    pub fn with_size(len: usize) -> Self {
        let mut data = Vec::with_capacity(len.max(1));
        data.resize(len, 0);
        Self {
            repr: Repr::Owned(data),
        }
    }

    /// Take ownership of an existing allocation. Empty input is rejected.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(ShowError::InvalidArgument("empty buffer"));
        }
        Ok(Self {
            repr: Repr::Owned(data),
        })
    }
}

impl<'a> Buffer<'a> {
    /// Borrow an existing byte slice without taking ownership.
    pub fn view(data: &'a [u8]) -> Self {
        Self {
            repr: Repr::View(data),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Owned(v) => v.capacity(),
            Repr::View(s) => s.len(),
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self.repr, Repr::View(_))
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.repr {
            Repr::Owned(v) => v,
            Repr::View(s) => s,
        }
    }

    /// Mutable access to the contents. Fails for views.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &mut self.repr {
            Repr::Owned(v) => Ok(v),
            Repr::View(_) => Err(ShowError::ViewImmutable),
        }
    }

    /// Resize to `new_len` bytes, zero-filling any newly exposed bytes.
    ///
    /// Capacity grows by doubling until `new_len` fits and never shrinks.
    /// Fails with `CapacityOverflow` if the doubling overflows, and with
    /// `ViewImmutable` on views.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        let v = self.owned_mut()?;
        if new_len > v.capacity() {
            let mut cap = v.capacity().max(1);
            while cap < new_len {
                cap = cap
                    .checked_mul(2)
                    .ok_or(ShowError::CapacityOverflow { requested: new_len })?;
            }
            v.reserve_exact(cap - v.len());
        }
        v.resize(new_len, 0);
        Ok(())
    }

    /// Set the length to zero. Capacity is retained. Fails for views.
    pub fn clear(&mut self) -> Result<()> {
        self.owned_mut()?.clear();
        Ok(())
    }

    /// Shrink capacity to the current length. Fails for views.
    pub fn prune(&mut self) -> Result<()> {
        self.owned_mut()?.shrink_to_fit();
        Ok(())
    }

    /// Overwrite every byte with `value`. Fails for views.
    pub fn fill(&mut self, value: u8) -> Result<()> {
        self.owned_mut()?.fill(value);
        Ok(())
    }

    /// Append a single byte. Fails for views.
    pub fn push(&mut self, byte: u8) -> Result<()> {
        let len = self.len();
        self.resize(len + 1)?;
        self.owned_mut()?[len] = byte;
        Ok(())
    }

    /// Append a byte slice. Fails for views.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let len = self.len();
        let new_len = len
            .checked_add(bytes.len())
            .ok_or(ShowError::CapacityOverflow { requested: usize::MAX })?;
        self.resize(new_len)?;
        self.owned_mut()?[len..].copy_from_slice(bytes);
        Ok(())
    }

    /// Append the contents of another buffer. Fails for views.
    pub fn concat(&mut self, other: &Buffer<'_>) -> Result<()> {
        self.extend_from_slice(other.as_slice())
    }

    fn owned_mut(&mut self) -> Result<&mut Vec<u8>> {
        match &mut self.repr {
            Repr::Owned(v) => Ok(v),
            Repr::View(_) => Err(ShowError::ViewImmutable),
        }
    }
}

impl Default for Buffer<'static> {
    fn default() -> Self {
        Self::with_size(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_size_is_zeroed() {
        let buf = Buffer::with_size(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.capacity() >= 16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_size_still_allocates() {
        let buf = Buffer::with_size(0);
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 1);
    }

    #[test]
    fn from_vec_rejects_empty() {
        assert!(Buffer::from_vec(Vec::new()).is_err());
        assert_eq!(Buffer::from_vec(vec![1, 2, 3]).unwrap().len(), 3);
    }

    #[test]
    fn append_grows_size() {
        let mut buf = Buffer::with_size(0);
        buf.extend_from_slice(b"hello").unwrap();
        assert_eq!(buf.len(), 5);
        buf.push(b'!').unwrap();
        assert_eq!(buf.as_slice(), b"hello!");
    }

    #[test]
    fn capacity_doubles() {
        let mut buf = Buffer::with_size(1);
        buf.resize(3).unwrap();
        // 1 -> 2 -> 4
        assert_eq!(buf.capacity(), 4);
        buf.resize(9).unwrap();
        // 4 -> 8 -> 16
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn resize_down_keeps_capacity() {
        let mut buf = Buffer::with_size(8);
        let cap = buf.capacity();
        buf.resize(2).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn grown_bytes_are_zeroed() {
        let mut buf = Buffer::from_vec(vec![0xFF; 4]).unwrap();
        buf.resize(8).unwrap();
        assert_eq!(&buf.as_slice()[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = Buffer::with_size(32);
        buf.clear().unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 32);
    }

    #[test]
    fn prune_shrinks_capacity() {
        let mut buf = Buffer::with_size(64);
        buf.resize(3).unwrap();
        buf.prune().unwrap();
        assert_eq!(buf.capacity(), 3);
    }

    #[test]
    fn view_refuses_mutation() {
        let backing = [1u8, 2, 3];
        let mut buf = Buffer::view(&backing);
        assert!(buf.is_view());
        assert!(matches!(buf.resize(8), Err(ShowError::ViewImmutable)));
        assert!(matches!(buf.clear(), Err(ShowError::ViewImmutable)));
        assert!(matches!(buf.push(0), Err(ShowError::ViewImmutable)));
        assert!(matches!(buf.fill(0), Err(ShowError::ViewImmutable)));
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn concat_appends() {
        let mut a = Buffer::from_vec(vec![1, 2]).unwrap();
        let backing = [3u8, 4];
        let b = Buffer::view(&backing);
        a.concat(&b).unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn fill_overwrites() {
        let mut buf = Buffer::with_size(4);
        buf.fill(0xAB).unwrap();
        assert_eq!(buf.as_slice(), &[0xAB; 4]);
    }
}
