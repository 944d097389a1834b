/// Progress of the chunked data stage currently in flight.
///
/// Invariant: `transferred <= length <= capacity` at every observation point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    length: usize,
    transferred: usize,
}

/// Result of feeding one OUT packet to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    InProgress,
    Complete,
}

impl TransferProgress {
    /// Resets the counters for a new transfer, clamping the requested length to `capacity`.
    pub fn arm(&mut self, requested: u16, capacity: usize) {
        self.length = usize::from(requested).min(capacity);
        self.transferred = 0;
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn transferred(&self) -> usize {
        self.transferred
    }

    pub fn remaining(&self) -> usize {
        self.length - self.transferred
    }

    pub fn is_complete(&self) -> bool {
        self.transferred == self.length
    }

    /// Copies as much of `packet` as still fits into `buffer`, returning the number of bytes taken.
    pub fn receive(&mut self, buffer: &mut [u8], packet: &[u8]) -> usize {
        let count = packet.len().min(self.remaining());
        let start = self.transferred;
        buffer[start..start + count].copy_from_slice(&packet[..count]);
        self.advance(count);
        count
    }

    /// Fills `slot` from `buffer` with as many bytes as remain, returning the number produced.
    pub fn send(&mut self, buffer: &[u8], slot: &mut [u8]) -> usize {
        let count = slot.len().min(self.remaining());
        let start = self.transferred;
        slot[..count].copy_from_slice(&buffer[start..start + count]);
        self.advance(count);
        count
    }

    fn advance(&mut self, count: usize) {
        self.transferred += count;
        debug_assert!(self.transferred <= self.length);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arm_clamps_to_capacity() {
        let mut progress = TransferProgress::default();
        progress.arm(600, 512);
        assert_eq!(progress.length(), 512);
        assert_eq!(progress.transferred(), 0);

        progress.arm(12, 512);
        assert_eq!(progress.length(), 12);
    }

    #[test]
    fn receive_stops_at_length() {
        let mut buffer = [0u8; 16];
        let mut progress = TransferProgress::default();
        progress.arm(5, buffer.len());

        assert_eq!(progress.receive(&mut buffer, b"abc"), 3);
        assert!(!progress.is_complete());
        assert_eq!(progress.receive(&mut buffer, b"defgh"), 2);
        assert!(progress.is_complete());
        assert_eq!(progress.receive(&mut buffer, b"ijk"), 0);
        assert_eq!(&buffer[..6], b"abcde\0");
    }

    #[test]
    fn send_reports_exhaustion_with_zero() {
        let buffer = *b"0123456789";
        let mut progress = TransferProgress::default();
        progress.arm(10, buffer.len());

        let mut slot = [0u8; 8];
        assert_eq!(progress.send(&buffer, &mut slot), 8);
        assert_eq!(&slot, b"01234567");
        assert_eq!(progress.send(&buffer, &mut slot), 2);
        assert_eq!(&slot[..2], b"89");
        assert_eq!(progress.send(&buffer, &mut slot), 0);
    }

    #[test]
    fn rearming_restarts_from_zero() {
        let buffer = [7u8; 4];
        let mut progress = TransferProgress::default();
        progress.arm(4, buffer.len());
        let mut slot = [0u8; 4];
        progress.send(&buffer, &mut slot);
        assert!(progress.is_complete());

        progress.arm(4, buffer.len());
        assert_eq!(progress.remaining(), 4);
    }
}
