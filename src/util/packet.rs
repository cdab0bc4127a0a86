/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// How much headroom to reserve in front of wire data so that header rewriting
/// (switch header strip/regrow, route header assembly, handle prefixing) never
/// needs to reallocate. Generous but arbitrary; the packet allocator this stands
/// in for is out of scope (see crate docs).
pub const DEFAULT_HEADROOM: usize = 96;

/// An owned, bounds-checked packet buffer with headroom at the front.
///
/// Ingress/egress pipelines repeatedly strip and regrow headers at the *front*
/// of a packet (switch header, handle prefix, route header). Rather than model
/// this with a fixed-capacity array the way the reference codebase's `Buffer<L>`
/// does for append-only wire encoding, `Packet` keeps a `Vec<u8>` with a logical
/// `head` cursor: stripping a header just advances `head`, and bytes before it
/// remain physically present (so they can be re-read, e.g. the retained switch
/// header) until something else is pushed in front of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    buf: Vec<u8>,
    head: usize,
}

impl Packet {
    /// Wrap wire data with the default headroom reserved in front of it.
    pub fn from_wire(data: &[u8]) -> Self {
        Self::with_headroom(DEFAULT_HEADROOM, data)
    }

    /// Wrap wire data with an explicit amount of front headroom.
    pub fn with_headroom(headroom: usize, data: &[u8]) -> Self {
        let mut buf = vec![0u8; headroom + data.len()];
        buf[headroom..].copy_from_slice(data);
        Self { buf, head: headroom }
    }

    /// Number of readable bytes from the current head to the end of the buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes available to prepend to before a reallocation would be required.
    #[inline(always)]
    pub fn headroom(&self) -> usize {
        self.head
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    #[inline(always)]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.head..]
    }

    /// Remove and return the first `n` bytes, advancing the logical start of the
    /// packet. The removed bytes stay physically present in the buffer (they can
    /// still be read with [`Packet::peek_stripped`]) until something is pushed
    /// back in front of the new head.
    pub fn strip_front(&mut self, n: usize) -> Result<(), crate::error::PacketError> {
        if n > self.len() {
            return Err(crate::error::PacketError::Runt);
        }
        self.head += n;
        Ok(())
    }

    /// Read the first `n` bytes of the current packet without removing them.
    pub fn peek_front(&self, n: usize) -> Result<&[u8], crate::error::PacketError> {
        if n > self.len() {
            return Err(crate::error::PacketError::Runt);
        }
        Ok(&self.buf[self.head..self.head + n])
    }

    /// Read `n` bytes that were previously stripped from the front, i.e. the
    /// region `[head - n, head)`. Used to recover a retained header without a
    /// separate copy.
    pub fn peek_stripped(&self, n: usize) -> Result<&[u8], crate::error::PacketError> {
        if n > self.head {
            return Err(crate::error::PacketError::LayoutViolation);
        }
        Ok(&self.buf[self.head - n..self.head])
    }

    /// Prepend `bytes` to the packet, failing if there isn't enough headroom.
    /// Lack of headroom here is a programming error per the crate's error tiers:
    /// callers construct packets with headroom sized for the header growth their
    /// pipeline performs.
    pub fn push_front(&mut self, bytes: &[u8]) -> Result<(), crate::error::PacketError> {
        if bytes.len() > self.head {
            return Err(crate::error::PacketError::InsufficientHeadroom);
        }
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf[self.head..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_then_peek_stripped_recovers_bytes() {
        let mut p = Packet::from_wire(&[1, 2, 3, 4, 5, 6]);
        p.strip_front(2).unwrap();
        assert_eq!(p.as_bytes(), &[3, 4, 5, 6]);
        assert_eq!(p.peek_stripped(2).unwrap(), &[1, 2]);
    }

    #[test]
    fn push_front_then_strip_round_trips() {
        let mut p = Packet::from_wire(&[0xaa, 0xbb]);
        p.push_front(&[1, 2, 3, 4]).unwrap();
        assert_eq!(p.as_bytes(), &[1, 2, 3, 4, 0xaa, 0xbb]);
    }

    #[test]
    fn push_front_without_headroom_errors() {
        let mut p = Packet::with_headroom(0, &[1, 2, 3]);
        assert!(p.push_front(&[9]).is_err());
    }

    #[test]
    fn strip_more_than_available_errors() {
        let mut p = Packet::from_wire(&[1, 2]);
        assert!(p.strip_front(3).is_err());
    }
}
