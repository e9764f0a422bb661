//! Serial pixel strip (BlinkyTape-style)
//!
//! Protocol:
//! - Each pixel is 3 bytes, R G B, in strip order
//! - Channel values are capped at 254; 0xFF is reserved
//! - A single 0xFF byte latches the frame onto the strip

use crate::infra::error::DeviceError;
use crate::io::indicator::{PixelSink, Rgb};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, trace};

const LATCH_BYTE: u8 = 0xFF;
const MAX_CHANNEL: u8 = 0xFE;

/// Encode one frame including the trailing latch byte
pub fn encode_frame(frame: &[Rgb]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frame.len() * 3 + 1);
    for &Rgb(r, g, b) in frame {
        bytes.extend_from_slice(&[r.min(MAX_CHANNEL), g.min(MAX_CHANNEL), b.min(MAX_CHANNEL)]);
    }
    bytes.push(LATCH_BYTE);
    bytes
}

pub struct BlinkyTape {
    device: String,
    port: tokio_serial::SerialStream,
}

impl BlinkyTape {
    /// Open the strip's serial port
    pub fn open(device: &str, baud: u32) -> Result<Self, DeviceError> {
        let port = tokio_serial::new(device, baud)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|source| DeviceError::Open { device: device.to_string(), source })?;

        info!(device = %device, baud = %baud, "indicator_port_opened");
        Ok(Self { device: device.to_string(), port })
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

#[async_trait]
impl PixelSink for BlinkyTape {
    async fn show(&mut self, frame: &[Rgb]) -> Result<(), DeviceError> {
        let bytes = encode_frame(frame);
        self.port.write_all(&bytes).await?;
        self.port.flush().await?;
        trace!(device = %self.device, bytes = %bytes.len(), "indicator_frame_written");
        Ok(())
    }
}
