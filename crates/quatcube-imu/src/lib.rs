pub mod decoder;
pub mod protocol;
pub mod store;
pub mod text;
pub mod transport;
pub mod types;

pub use decoder::{decoder_for, FrameDecoder};
pub use store::OrientationStore;
pub use types::{DecoderStats, Orientation};

use anyhow::{anyhow, Context, Result};
use quatcube_config::{Protocol, SerialConfig};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Bytes requested per read.
const READ_CHUNK: usize = 512;

/// Samples between debug heartbeats.
const HEARTBEAT_SAMPLES: u64 = 1000;

/// Client for a serial IMU.
///
/// Owns a background thread that reads the byte stream, decodes it and
/// publishes every sample into an [`OrientationStore`]. The render loop
/// reads the store; neither side waits on the other.
pub struct ImuClient {
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ImuClient {
    /// Open the configured serial port and start decoding.
    pub fn connect(config: &SerialConfig, store: OrientationStore) -> Result<Self> {
        let port = transport::open_serial(config)?;
        tracing::info!(port = %config.port, "Connected to IMU");
        Self::spawn(port, config.protocol, store)
    }

    /// Start decoding from any byte source.
    ///
    /// Reads should return periodically (a timeout error counts) so that
    /// [`ImuClient::shutdown`] is not held up by a silent source.
    pub fn spawn<R>(reader: R, protocol: Protocol, store: OrientationStore) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let decoder = decoder_for(protocol);

        let task = std::thread::Builder::new()
            .name("imu-reader".into())
            .spawn({
                let stop = stop.clone();
                move || imu_read_loop(reader, decoder, store, stop)
            })
            .context("spawning IMU reader thread")?;

        Ok(Self {
            stop,
            task: Some(task),
        })
    }

    /// Whether the reader is still receiving. False once the link closed or
    /// failed.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the reader, close the transport and report how the reader ended.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.task.take() {
            Some(task) => task
                .join()
                .map_err(|_| anyhow!("IMU reader thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for ImuClient {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            tracing::warn!(?e, "IMU reader ended with an error");
        }
    }
}

/// Background thread: read bytes, decode frames, publish orientation.
fn imu_read_loop<R: Read>(
    mut reader: R,
    mut decoder: Box<dyn FrameDecoder>,
    store: OrientationStore,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let mut buf = [0u8; READ_CHUNK];
    let mut sample_count: u64 = 0;
    tracing::debug!("IMU reader thread started");

    while !stop.load(Ordering::Acquire) {
        match reader.read(&mut buf) {
            Ok(0) => {
                tracing::warn!(sample_count, "IMU serial link closed");
                return Ok(());
            }
            Ok(n) => {
                decoder.push_data(&buf[..n]);

                // Drain all available samples; only the last one matters to
                // the renderer but each is published in order.
                while let Some(sample) = decoder.next_sample() {
                    store.publish(sample);
                    sample_count += 1;
                    if sample_count % HEARTBEAT_SAMPLES == 0 {
                        let stats = decoder.stats();
                        tracing::debug!(
                            sample_count,
                            discarded_bytes = stats.discarded_bytes,
                            rejected_lines = stats.rejected_lines,
                            overflows = stats.overflows,
                            "IMU samples processed"
                        );
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::error!(?e, "IMU serial read error");
                return Err(e).context("reading from IMU");
            }
        }
    }

    tracing::debug!(sample_count, "IMU reader thread stopping");
    Ok(())
}
