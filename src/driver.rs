use custom_class_device::protocol::{Request, DATA_BUFFER_SIZE, STATUS_BUFFER_SIZE};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::DriverError;
use crate::transport::ControlTransport;

// wLength is 16 bits wide
const MAX_CONTROL_LENGTH: usize = u16::MAX as usize;

/// Host side of the custom-class protocol
pub struct CustomClassDevice<T: ControlTransport> {
    transport: T,
}

impl<T: ControlTransport> CustomClassDevice<T> {
    pub fn new(transport: T) -> Self {
        CustomClassDevice { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn set_led(&mut self, value: u16) -> Result<(), DriverError> {
        let count = self
            .transport
            .write_control(Request::SetLed.code(), value, 0, &[])?;
        debug!("{} bytes sent", count);
        Ok(())
    }

    pub fn get_led(&mut self) -> Result<u8, DriverError> {
        let mut buffer = [0u8; 1];
        let count = self
            .transport
            .read_control(Request::GetLed.code(), 0, 0, &mut buffer)?;
        debug!("{} bytes received", count);
        if count != 1 {
            return Err(DriverError::UnexpectedLength {
                expected: 1,
                actual: count,
            });
        }
        Ok(buffer[0])
    }

    pub fn read_status(&mut self) -> Result<Vec<u8>, DriverError> {
        let mut buffer = vec![0u8; STATUS_BUFFER_SIZE];
        let count = self
            .transport
            .read_control(Request::StatusRead.code(), 0, 0, &mut buffer)?;
        debug!("{} bytes received", count);
        buffer.truncate(count);
        Ok(buffer)
    }

    /// Overwrites the first 4 bytes of the device's status string with the start of `status`.
    pub fn write_status(&mut self, status: &str) -> Result<(), DriverError> {
        let &[a, b, c, d, ..] = status.as_bytes() else {
            return Err(DriverError::StatusTooShort(status.len()));
        };
        let value = u16::from_le_bytes([a, b]);
        let index = u16::from_le_bytes([c, d]);
        let count = self
            .transport
            .write_control(Request::StatusWrite.code(), value, index, &[])?;
        debug!("{} bytes sent", count);
        Ok(())
    }

    /// Writes `data` into the device buffer, issuing further transfers while the device keeps
    /// accepting everything it is offered. Returns the number of bytes the device took.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, DriverError> {
        let mut sent = 0;
        for k in 0.. {
            let end = (sent + MAX_CONTROL_LENGTH).min(data.len());
            let chunk = &data[sent..end];
            let count = self
                .transport
                .write_control(Request::DataWrite.code(), 0, 0, chunk)?;
            sent += count;
            debug!("{}: send {}/{}", k, sent, data.len());

            if count < chunk.len() || sent >= data.len() {
                break;
            }
        }
        Ok(sent)
    }

    /// Reads up to `length` bytes out of the device buffer. Stops early on a short transfer.
    pub fn recv(&mut self, length: usize) -> Result<Vec<u8>, DriverError> {
        let mut buffer = vec![0u8; length];
        let mut received = 0;
        for k in 0.. {
            let end = (received + MAX_CONTROL_LENGTH).min(length);
            let requested = end - received;
            let count = self.transport.read_control(
                Request::DataRead.code(),
                0,
                0,
                &mut buffer[received..end],
            )?;
            received += count;
            debug!("{}: recv {}/{}", k, received, length);

            if count < requested || received >= length {
                break;
            }
        }
        buffer.truncate(received);
        Ok(buffer)
    }

    /// Repeatedly writes a random buffer to the device, reads it back and compares.
    ///
    /// Transport errors fail the iteration but do not stop the test.
    pub fn reliability_test(&mut self, iterations: usize, rng: &mut impl Rng) -> TestReport {
        let mut report = TestReport::default();

        for iteration in 0..iterations {
            info!("iter = {}", iteration);
            report.iterations += 1;

            let mut sent = vec![0u8; DATA_BUFFER_SIZE];
            rng.fill(&mut sent[..]);
            let mut received = vec![0xffu8; DATA_BUFFER_SIZE];

            if let Err(err) = self.send(&sent) {
                error!(iteration, "USB error: {}", err);
                report.transport_errors += 1;
                report.failed_iterations += 1;
                continue;
            }
            match self.recv(DATA_BUFFER_SIZE) {
                Ok(data) => received[..data.len()].copy_from_slice(&data),
                Err(err) => {
                    error!(iteration, "USB error: {}", err);
                    report.transport_errors += 1;
                    report.failed_iterations += 1;
                    continue;
                }
            }

            let mut failed = false;
            for (index, (&expected, &actual)) in sent.iter().zip(received.iter()).enumerate() {
                if expected != actual {
                    warn!(
                        iteration,
                        "buffer[{}] {:02x} != buffer2[{}] {:02x}", index, expected, index, actual
                    );
                    report.mismatches.push(Mismatch {
                        iteration,
                        index,
                        sent: expected,
                        received: actual,
                    });
                    failed = true;
                }
            }
            if failed {
                report.failed_iterations += 1;
            }
            info!("{}: comp done", iteration);
        }

        report
    }
}

/// The status buffer as text, up to the first NUL
pub fn status_text(status: &[u8]) -> String {
    let end = status.iter().position(|&b| b == 0).unwrap_or(status.len());
    String::from_utf8_lossy(&status[..end]).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub iteration: usize,
    pub index: usize,
    pub sent: u8,
    pub received: u8,
}

#[derive(Debug, Default)]
pub struct TestReport {
    pub iterations: usize,
    pub failed_iterations: usize,
    pub transport_errors: usize,
    pub mismatches: Vec<Mismatch>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.failed_iterations == 0
    }

    pub fn first_mismatch(&self) -> Option<&Mismatch> {
        self.mismatches.first()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loopback::LoopbackTransport;
    use rand::{rngs::StdRng, SeedableRng};

    fn loopback() -> CustomClassDevice<LoopbackTransport> {
        CustomClassDevice::new(LoopbackTransport::new())
    }

    #[test]
    fn led_round_trip() -> anyhow::Result<()> {
        let mut device = loopback();
        for value in 0..=31 {
            device.set_led(value)?;
            assert_eq!(device.get_led()?, value as u8 & 0x1f);
        }

        device.set_led(0x05)?;
        assert_eq!(device.get_led()?, 0x05);
        Ok(())
    }

    #[test]
    fn write_status_shows_up_in_read_status() -> anyhow::Result<()> {
        let mut device = loopback();
        assert_eq!(status_text(&device.read_status()?), "Hello, USB!");

        device.write_status("ABCD")?;
        let status = device.read_status()?;
        assert_eq!(status.len(), STATUS_BUFFER_SIZE);
        assert_eq!(status_text(&status), "ABCDo, USB!");
        Ok(())
    }

    #[test]
    fn write_status_uses_only_four_bytes() -> anyhow::Result<()> {
        let mut device = loopback();
        device.write_status("3210 and more")?;
        assert_eq!(&device.read_status()?[..5], b"3210o");
        Ok(())
    }

    #[test]
    fn short_status_is_rejected() {
        let mut device = loopback();
        let err = device.write_status("abc").unwrap_err();
        assert!(matches!(err, DriverError::StatusTooShort(3)));
    }

    #[test]
    fn data_round_trips() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut device = loopback();
        for length in [0, 1, 8, 13, 64, 500, 512] {
            let mut data = vec![0u8; length];
            rng.fill(&mut data[..]);

            assert_eq!(device.send(&data)?, length);
            assert_eq!(device.recv(length)?, data);
        }
        Ok(())
    }

    #[test]
    fn oversized_send_is_clamped() -> anyhow::Result<()> {
        let mut device = loopback();
        device.send(&[0x55; 512])?;

        assert_eq!(device.send(&[0u8; 600])?, DATA_BUFFER_SIZE);

        let data = device.recv(600)?;
        assert_eq!(data.len(), DATA_BUFFER_SIZE);
        assert!(data.iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn recv_of_more_than_the_buffer_stops_at_short_transfer() -> anyhow::Result<()> {
        let mut device = loopback();
        let data = device.recv(100_000)?;
        assert_eq!(data.len(), DATA_BUFFER_SIZE);
        Ok(())
    }

    #[test]
    fn unknown_request_looks_like_an_empty_ack() -> anyhow::Result<()> {
        let mut transport = LoopbackTransport::new();
        let mut buf = [0u8; 8];
        assert_eq!(transport.read_control(0x42, 0, 0, &mut buf)?, 0);
        assert_eq!(transport.write_control(0x42, 0, 0, &[])?, 0);
        Ok(())
    }

    #[test]
    fn reliability_test_passes_on_loopback() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut device = loopback();
        let report = device.reliability_test(10, &mut rng);

        assert_eq!(report.iterations, 10);
        assert!(report.passed());
        assert!(report.first_mismatch().is_none());
    }

    /// Loopback that corrupts every other byte it reads back
    struct LossyReads(LoopbackTransport);

    impl ControlTransport for LossyReads {
        fn read_control(
            &mut self,
            request: u8,
            value: u16,
            index: u16,
            buf: &mut [u8],
        ) -> Result<usize, DriverError> {
            let count = self.0.read_control(request, value, index, buf)?;
            for byte in buf.iter_mut().skip(1).step_by(2) {
                *byte = !*byte;
            }
            Ok(count)
        }

        fn write_control(
            &mut self,
            request: u8,
            value: u16,
            index: u16,
            data: &[u8],
        ) -> Result<usize, DriverError> {
            self.0.write_control(request, value, index, data)
        }
    }

    #[test]
    fn reliability_test_reports_mismatches() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut device = CustomClassDevice::new(LossyReads(LoopbackTransport::new()));
        let report = device.reliability_test(2, &mut rng);

        assert_eq!(report.failed_iterations, 2);
        assert_eq!(report.mismatches.len(), 2 * DATA_BUFFER_SIZE / 2);
        let first = report.first_mismatch().copied();
        assert_eq!(first.map(|m| (m.iteration, m.index)), Some((0, 1)));
        assert_eq!(first.map(|m| m.received), first.map(|m| !m.sent));
    }

    /// Fails the first write, then behaves
    struct FlakyWrites {
        inner: LoopbackTransport,
        failures_left: usize,
    }

    impl ControlTransport for FlakyWrites {
        fn read_control(
            &mut self,
            request: u8,
            value: u16,
            index: u16,
            buf: &mut [u8],
        ) -> Result<usize, DriverError> {
            self.inner.read_control(request, value, index, buf)
        }

        fn write_control(
            &mut self,
            request: u8,
            value: u16,
            index: u16,
            data: &[u8],
        ) -> Result<usize, DriverError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(rusb::Error::Timeout.into());
            }
            self.inner.write_control(request, value, index, data)
        }
    }

    #[test]
    fn reliability_test_continues_after_transport_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut device = CustomClassDevice::new(FlakyWrites {
            inner: LoopbackTransport::new(),
            failures_left: 1,
        });
        let report = device.reliability_test(3, &mut rng);

        assert_eq!(report.iterations, 3);
        assert_eq!(report.transport_errors, 1);
        assert_eq!(report.failed_iterations, 1);
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn transport_errors_abort_single_operations() {
        let mut device = CustomClassDevice::new(FlakyWrites {
            inner: LoopbackTransport::new(),
            failures_left: 1,
        });
        let err = device.set_led(1).unwrap_err();
        assert!(matches!(err, DriverError::RusbError(rusb::Error::Timeout)));
        assert!(device.set_led(1).is_ok());
    }
}
