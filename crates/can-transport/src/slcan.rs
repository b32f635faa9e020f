use crate::{BusInfo, CanBus, CanFrame, CanId, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;

/// SLCAN (Lawicel) text protocol over a USB serial adapter, as used by CANUSB4 and
/// similar CBUS interfaces.
pub struct SlcanBus {
    port_path: String,
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SlcanBus {
    pub fn open_with(path: &str, bitrate: Option<SlcanBitrate>) -> Result<Self> {
        let mut port = serialport::new(path, 115_200)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| TransportError::Serial(format!("{path}: {e}")))?;
        // Close, select bitrate, reopen. CBUS runs at 125k.
        let code = bitrate.unwrap_or(SlcanBitrate::B125k).code();
        Self::write_cmd(&mut *port, b"C\r")?;
        Self::write_cmd(&mut *port, &[b'S', code, b'\r'])?;
        Self::write_cmd(&mut *port, b"O\r")?;
        tracing::debug!(path, bitrate = %char::from(code), "slcan channel opened");
        Ok(SlcanBus {
            port_path: path.to_string(),
            port,
            pending: Vec::with_capacity(64),
        })
    }

    pub fn path(&self) -> &str {
        &self.port_path
    }

    pub(crate) fn encode_frame(frame: &CanFrame) -> Result<Vec<u8>> {
        if frame.rtr {
            return Err(TransportError::Unsupported("remote frame transmission"));
        }
        if frame.len > 8 {
            return Err(TransportError::InvalidFrame("dlc > 8"));
        }
        let mut line = if frame.id.is_extended() {
            format!("T{:08X}", frame.id.raw())
        } else {
            format!("t{:03X}", frame.id.raw())
        };
        line.push(char::from(b'0' + frame.len));
        for b in frame.payload() {
            line.push_str(&format!("{b:02X}"));
        }
        line.push('\r');
        Ok(line.into_bytes())
    }

    pub(crate) fn parse_frame(line: &[u8]) -> Result<CanFrame> {
        let (&kind, rest) = line
            .split_first()
            .ok_or(TransportError::InvalidFrame("empty"))?;
        let (id_len, extended, rtr) = match kind {
            b't' => (3, false, false),
            b'r' => (3, false, true),
            b'T' => (8, true, false),
            b'R' => (8, true, true),
            _ => return Err(TransportError::InvalidFrame("unknown header")),
        };
        if rest.len() < id_len + 1 {
            return Err(TransportError::InvalidFrame("short header"));
        }
        let raw_id = u32::from_str_radix(hex_str(&rest[..id_len])?, 16)
            .map_err(|_| TransportError::InvalidFrame("id"))?;
        let id = match extended {
            true => CanId::extended(raw_id),
            false => u16::try_from(raw_id).ok().and_then(CanId::standard),
        };
        let id = id.ok_or(TransportError::InvalidFrame("id range"))?;

        let dlc = rest[id_len].wrapping_sub(b'0');
        if dlc > 8 {
            return Err(TransportError::InvalidFrame("dlc > 8"));
        }
        let mut data = [0u8; 8];
        if !rtr {
            let hex = &rest[id_len + 1..];
            if hex.len() < usize::from(dlc) * 2 {
                return Err(TransportError::InvalidFrame("short data"));
            }
            for (slot, pair) in data.iter_mut().zip(hex.chunks(2)).take(usize::from(dlc)) {
                *slot = u8::from_str_radix(hex_str(pair)?, 16)
                    .map_err(|_| TransportError::InvalidFrame("byte"))?;
            }
        }
        Ok(CanFrame {
            id,
            len: dlc,
            data,
            rtr,
            timestamp: None,
        }
        .stamped())
    }

    fn write_cmd(port: &mut dyn SerialPort, cmd: &[u8]) -> Result<()> {
        port.write_all(cmd)?;
        Ok(())
    }

    /// Pop one complete `\r`-terminated line out of the receive buffer.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\r')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

fn hex_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| TransportError::InvalidFrame("utf8"))
}

impl CanBus for SlcanBus {
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, None)
    }

    fn list() -> Result<Vec<BusInfo>> {
        let ports = serialport::available_ports().map_err(|e| TransportError::Serial(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|p| BusInfo {
                driver: match p.port_type {
                    SerialPortType::UsbPort(_) => "slcan-serial".to_string(),
                    _ => "serial".to_string(),
                },
                name: p.port_name,
            })
            .collect())
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<CanFrame> {
        if let Some(ms) = timeout_ms {
            self.port.set_timeout(Duration::from_millis(ms)).ok();
        }
        let mut buf = [0u8; 128];
        loop {
            while let Some(line) = self.take_line() {
                // Bare CRs and BELs are command acknowledgements, not frames
                if line.is_empty() || line == [0x07] {
                    continue;
                }
                return Self::parse_frame(&line);
            }
            match self.port.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let line = Self::encode_frame(frame)?;
        self.port.write_all(&line)?;
        Ok(())
    }
}

/// Supported SLCAN bitrates (mapped to Sx codes)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlcanBitrate {
    B10k,
    B20k,
    B50k,
    B100k,
    B125k,
    B250k,
    B500k,
    B800k,
    B1M,
}

impl SlcanBitrate {
    pub fn code(self) -> u8 {
        match self {
            SlcanBitrate::B10k => b'0',
            SlcanBitrate::B20k => b'1',
            SlcanBitrate::B50k => b'2',
            SlcanBitrate::B100k => b'3',
            SlcanBitrate::B125k => b'4',
            SlcanBitrate::B250k => b'5',
            SlcanBitrate::B500k => b'6',
            SlcanBitrate::B800k => b'7',
            SlcanBitrate::B1M => b'8',
        }
    }
}
