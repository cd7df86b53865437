//! cpal-backed microphone capture.
//!
//! `cpal::Stream` is not `Send`, so each capture run owns a dedicated thread
//! that opens the stream, reports readiness and parks until stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    AudioSource, CaptureError, CaptureErrorCallback, CaptureOptions, CaptureResult,
    FrameAssembler, FrameCallback,
};

/// List the names of available input devices.
pub fn list_input_devices() -> CaptureResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Microphone capture on the host audio API.
pub struct MicrophoneCapture {
    options: CaptureOptions,
    worker: Mutex<Option<CaptureWorker>>,
    capturing: Arc<AtomicBool>,
}

impl MicrophoneCapture {
    pub fn new(options: CaptureOptions) -> Self {
        Self {
            options,
            worker: Mutex::new(None),
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }
}

impl Default for MicrophoneCapture {
    fn default() -> Self {
        Self::new(CaptureOptions::default())
    }
}

impl AudioSource for MicrophoneCapture {
    fn start(&self, on_frame: FrameCallback, on_error: CaptureErrorCallback) -> CaptureResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(CaptureError::DeviceAccess(
                "capture is already running".to_string(),
            ));
        }

        let (ready_tx, ready_rx) = mpsc::channel::<CaptureResult<String>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let options = self.options.clone();
        let capturing = self.capturing.clone();

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream(&options, on_frame, on_error) {
                    Ok((stream, device_name)) => {
                        let _ = ready_tx.send(Ok(device_name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Parks until stop() sends or the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                capturing.store(false, Ordering::SeqCst);
                debug!("Microphone stream released");
            })
            .map_err(|e| CaptureError::DeviceAccess(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(device_name)) => {
                info!(device = %device_name, "Microphone capture started");
                self.capturing.store(true, Ordering::SeqCst);
                *worker = Some(CaptureWorker { stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::DeviceAccess(
                    "capture thread exited before the stream opened".to_string(),
                ))
            }
        }
    }

    fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("Microphone capture thread panicked");
        }
        self.capturing.store(false, Ordering::SeqCst);
        info!("Microphone capture stopped");
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn select_device(host: &cpal::Host, device_name: Option<&str>) -> CaptureResult<cpal::Device> {
    match device_name {
        Some(name) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;
            devices
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or(CaptureError::NoDevice)
        }
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
    }
}

fn open_input_stream(
    options: &CaptureOptions,
    on_frame: FrameCallback,
    on_error: CaptureErrorCallback,
) -> CaptureResult<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = select_device(&host, options.device_name.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;
    let sample_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    // cpal exposes no processing toggles; hosts apply their own input chain.
    debug!(
        device = %device_name,
        sample_rate,
        channels,
        echo_cancellation = options.echo_cancellation,
        noise_suppression = options.noise_suppression,
        auto_gain_control = options.auto_gain_control,
        "Opening microphone stream"
    );

    let err_fn = move |err: cpal::StreamError| {
        warn!(error = %err, "Microphone stream error");
        on_error(CaptureError::DeviceAccess(err.to_string()));
    };

    let mut assembler = FrameAssembler::new(sample_rate);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for frame in assembler.push_interleaved(data, channels) {
                    on_frame(frame);
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                for frame in assembler.push_interleaved(&converted, channels) {
                    on_frame(frame);
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as f32 - 32768.0) / 32768.0)
                    .collect();
                for frame in assembler.push_interleaved(&converted, channels) {
                    on_frame(frame);
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::DeviceAccess(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    }
    .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;

    Ok((stream, device_name))
}
