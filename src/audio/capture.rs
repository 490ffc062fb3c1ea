use crate::acquisition::FrameProducer;
use crate::config::AcquisitionConfig;
use crate::error::{DoaError, Result};
use audio_thread_priority::RtPriorityHandle;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Live stereo capture feeding the acquisition double buffer.
///
/// The stream callback is the producer: every delivered block goes straight
/// into the buffer half being filled. Dropping the capture stops the stream.
pub struct AudioCapture {
    stream: cpal::Stream,
    _rt_handle: Option<RtPriorityHandle>,
}

impl AudioCapture {
    /// Open the named input device (or the default one) and start streaming
    pub fn new(
        config: &AcquisitionConfig,
        mut producer: FrameProducer<f32>,
        device_name: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => find_input_device(&host, name)?,
            None => host
                .default_input_device()
                .ok_or_else(|| DoaError::AudioDevice("No input device found".into()))?,
        };

        match device.description() {
            Ok(desc) => log::info!("Input device: {:?}", desc),
            Err(_) => log::info!("Input device: Unknown"),
        }

        // One callback per frame keeps the hand-off latency at one period
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.frame_len as u32),
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    producer.write(data);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| DoaError::AudioStream(format!("{}", e)))?;

        let rt_handle = audio_thread_priority::promote_current_thread_to_real_time(
            config.frame_len as u32,
            config.sample_rate,
        );

        let rt_handle = match rt_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not set real-time priority: {}", e);
                None
            }
        };

        stream
            .play()
            .map_err(|e| DoaError::AudioStream(format!("{}", e)))?;

        Ok(Self {
            stream,
            _rt_handle: rt_handle,
        })
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        let _ = self.stream.pause();
    }
}

#[allow(deprecated)]
fn find_input_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    let devices = host
        .input_devices()
        .map_err(|e| DoaError::AudioDevice(format!("{}", e)))?;
    for device in devices {
        if device.name().is_ok_and(|n| n.contains(name)) {
            return Ok(device);
        }
    }
    Err(DoaError::AudioDevice(format!(
        "No input device matching '{}'",
        name
    )))
}

/// Names of all input devices on the default host
#[allow(deprecated)]
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| DoaError::AudioDevice(format!("{}", e)))?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "unknown".to_string()))
        .collect())
}
