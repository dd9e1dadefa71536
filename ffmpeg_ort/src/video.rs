use std::path::Path;

use anyhow::Context as _;
use ffmpeg::format::{context, input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg::Packet;
use image::RgbImage;
use inference_common::sampler::FrameSource;

/// Decodes the best video stream of a file into RGB frames, one at a time.
///
/// Demuxer, decoder and scaler are released when this is dropped.
pub struct FfmpegVideo {
    ictx: context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Context,
    stream_index: usize,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegVideo {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        ffmpeg::init().context("Failed to initialize ffmpeg")?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);

        let ictx = input(&path).with_context(|| format!("Failed to open video {path:?}"))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or(ffmpeg::Error::StreamNotFound)
            .with_context(|| format!("No video stream in {path:?}"))?;
        let stream_index = stream.index();
        let frame_count = estimate_frame_count(&ictx, &stream);

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let scaler = Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            frame_count,
            eof_sent: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    pub fn frame_count_estimate(&self) -> u64 {
        self.frame_count
    }

    fn receive_image(&mut self) -> anyhow::Result<Option<RgbImage>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        to_rgb_image(&rgb_frame).map(Some)
    }
}

impl FrameSource for FfmpegVideo {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        loop {
            if let Some(image) = self.receive_image()? {
                return Ok(Some(image));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e).context("Failed to read packet"),
            }
        }
    }
}

/// Container frame count, or duration x frame rate when the container has none.
fn estimate_frame_count(ictx: &context::Input, stream: &ffmpeg::Stream) -> u64 {
    let seconds = if stream.duration() > 0 {
        stream.duration() as f64 * f64::from(stream.time_base())
    } else if ictx.duration() > 0 {
        ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
    } else {
        0.0
    };
    frame_count_from(stream.frames(), seconds, f64::from(stream.avg_frame_rate()))
}

fn frame_count_from(frames: i64, seconds: f64, fps: f64) -> u64 {
    if frames > 0 {
        return frames as u64;
    }
    let estimate = (seconds * fps).round();
    log::debug!("Container has no frame count, estimated {estimate} from {seconds}s at {fps} fps");
    if estimate.is_finite() && estimate > 0.0 {
        estimate as u64
    } else {
        0
    }
}

/// Copies an RGB24 frame into a tightly packed image, dropping row padding.
fn to_rgb_image(frame: &Video) -> anyhow::Result<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);

    let mut buf = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        buf.extend_from_slice(&row[..row_len]);
    }
    RgbImage::from_raw(width, height, buf)
        .with_context(|| format!("Decoded frame does not fit {width}x{height} RGB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_from_container() {
        assert_eq!(frame_count_from(120, 10.0, 25.0), 120);
    }

    #[test]
    fn test_frame_count_from_duration() {
        assert_eq!(frame_count_from(0, 4.0, 29.97), 120);
        assert_eq!(frame_count_from(-1, 2.0, 24.0), 48);
    }

    #[test]
    fn test_frame_count_unknown() {
        assert_eq!(frame_count_from(0, 0.0, 30.0), 0);
        // 0/0 frame rate
        assert_eq!(frame_count_from(0, 5.0, f64::NAN), 0);
    }

    #[test]
    fn test_to_rgb_image_drops_padding() {
        let (width, height) = (5, 3);
        let mut frame = Video::new(Pixel::RGB24, width, height);
        let stride = frame.stride(0);
        let row_len = width as usize * 3;
        assert!(stride >= row_len);

        let data = frame.data_mut(0);
        for (y, row) in data.chunks_mut(stride).take(height as usize).enumerate() {
            for (x, px) in row[..row_len].chunks_mut(3).enumerate() {
                px.copy_from_slice(&[x as u8, y as u8, 200]);
            }
            row[row_len..].fill(0xee);
        }

        let image = to_rgb_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (width, height));
        assert_eq!(image.as_raw().len(), row_len * height as usize);
        for (x, y, px) in image.enumerate_pixels() {
            assert_eq!(px.0, [x as u8, y as u8, 200]);
        }
    }
}
