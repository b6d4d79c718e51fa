use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

type BoxError = Box<dyn std::error::Error>;

/// Reads finished segments back through ffmpeg-next (libavformat +
/// libavcodec), converting decoded pictures to RGB24 [`Frame`]s.
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
        }
    }

    /// Reads a segment's stream parameters.
    ///
    /// Containers that never got a frame count in their header (e.g. a
    /// segment whose trailer was never written) are decoded once to count.
    pub fn probe(path: &Path) -> Result<VideoMetadata, BoxError> {
        let mut reader = Self::new();
        let mut metadata = reader.open(path)?;
        if metadata.total_frames == 0 {
            let mut counted = 0;
            for frame in reader.frames() {
                frame?;
                counted += 1;
            }
            metadata.total_frames = counted;
        }
        reader.close();
        Ok(metadata)
    }

    fn decoder_for(
        ictx: &ffmpeg_next::format::context::Input,
        stream_index: usize,
    ) -> Result<ffmpeg_next::decoder::Video, BoxError> {
        let stream = ictx
            .stream(stream_index)
            .ok_or("FfmpegReader: video stream disappeared")?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        Ok(codec_ctx.decoder().video()?)
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let total_frames = stream.frames().max(0) as usize;

        let decoder = Self::decoder_for(&ictx, video_stream_index)?;
        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.video_stream_index = video_stream_index;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        let decoder = match Self::decoder_for(ictx, self.video_stream_index) {
            Ok(d) => d,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        let (width, height) = (decoder.width(), decoder.height());

        let scaler = match ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        ) {
            Ok(s) => s,
            Err(e) => return Box::new(std::iter::once(Err(e.into()))),
        };

        Box::new(SegmentFrames {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index: self.video_stream_index,
            next_index: 0,
            state: DecodeState::Reading,
        })
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Reading,
    Draining,
    Done,
}

/// Lazily decodes one frame at a time; segments can run to tens of
/// thousands of frames.
struct SegmentFrames<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    next_index: usize,
    state: DecodeState,
}

impl SegmentFrames<'_> {
    fn receive(&mut self) -> Option<Result<Frame, BoxError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(e.into()));
        }

        let pixels = packed_rgb(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.next_index);
        self.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for SegmentFrames<'_> {
    type Item = Result<Frame, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                DecodeState::Done => return None,
                DecodeState::Draining => {
                    let received = self.receive();
                    if received.is_none() {
                        self.state = DecodeState::Done;
                    }
                    return received;
                }
                DecodeState::Reading => {
                    if let Some(result) = self.receive() {
                        return Some(result);
                    }
                    match self.ictx.packets().next() {
                        Some((stream, packet)) => {
                            if stream.index() == self.stream_index {
                                // Corrupt packets are skipped, matching player behavior
                                let _ = self.decoder.send_packet(&packet);
                            }
                        }
                        None => {
                            let _ = self.decoder.send_eof();
                            self.state = DecodeState::Draining;
                        }
                    }
                }
            }
        }
    }
}

/// Strips per-row stride padding from an RGB24 ffmpeg frame.
fn packed_rgb(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_writer::VideoWriter;
    use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;
    use std::path::PathBuf;

    fn write_segment(dir: &Path, frames: usize) -> PathBuf {
        let path = dir.join("mv_2024-03-01-08-15.mp4");
        let mut writer = FfmpegWriter::new();
        writer
            .open(&path, &VideoMetadata::for_encoding(160, 120, 10))
            .unwrap();
        for i in 0..frames {
            let value = ((i * 40) % 256) as u8;
            writer
                .write(&Frame::new(vec![value; 160 * 120 * 3], 160, 120, 3, i))
                .unwrap();
        }
        writer.close().unwrap();
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_segment(dir.path(), 5);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_errors() {
        let mut reader = FfmpegReader::new();
        assert!(reader.open(Path::new("/nonexistent/test.mp4")).is_err());
    }

    #[test]
    fn test_frames_yields_every_written_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_segment(dir.path(), 5);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let frames: Vec<_> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = FfmpegReader::new();
        let result = reader.frames().next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_reports_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_segment(dir.path(), 7);

        let meta = FfmpegReader::probe(&path).unwrap();
        assert_eq!(meta.total_frames, 7);
        assert_eq!((meta.width, meta.height), (160, 120));
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_segment(dir.path(), 1);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
    }
}
