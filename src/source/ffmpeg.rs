// src/source/ffmpeg.rs
//
// Kamera/RTSP über einen ffmpeg-Kindprozess: ffmpeg dekodiert, wir lesen
// rohe BGR24-Frames fester Größe von stdout.

use std::io::{BufReader, ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::anyhow;
use log::{debug, info, warn};

use crate::core::{RecorderError, RecorderResult};
use crate::ring::Frame;
use crate::source::{FrameSource, SourceRead};

pub struct FfmpegSource {
    address: String,
    width: u32,
    height: u32,
    child: Child,
    stdout: BufReader<ChildStdout>,
    pending: Option<Frame>,
    frames_read: u64,
}

impl FfmpegSource {
    /// Spawns the decoder and waits for the first frame, so an unreachable
    /// camera surfaces as `SourceUnavailable` instead of an immediate EOF.
    pub fn open(
        ffmpeg_bin: &str,
        address: &str,
        width: u32,
        height: u32,
        fps: u32,
    ) -> RecorderResult<Self> {
        let mut args: Vec<String> = vec!["-loglevel".into(), "error".into(), "-nostdin".into()];
        args.extend(input_args(address, width, height, fps));
        args.extend(output_args(width, height, fps));

        debug!("[source] {} {}", ffmpeg_bin, args.join(" "));

        let mut child = Command::new(ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RecorderError::source_unavailable(address, e))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RecorderError::source_unavailable(
                address,
                anyhow!("ffmpeg stdout not captured"),
            ));
        };

        let mut source = Self {
            address: address.to_string(),
            width,
            height,
            child,
            stdout: BufReader::new(stdout),
            pending: None,
            frames_read: 0,
        };

        match source.read_raw() {
            Ok(Some(frame)) => source.pending = Some(frame),
            Ok(None) => {
                return Err(RecorderError::source_unavailable(
                    address,
                    anyhow!("stream ended before the first frame"),
                ));
            }
            Err(e) => return Err(RecorderError::source_unavailable(address, e)),
        }

        info!("[source] opened {} ({}x{} @ {} fps)", address, width, height, fps);
        Ok(source)
    }

    fn read_raw(&mut self) -> anyhow::Result<Option<Frame>> {
        let mut data = vec![0u8; Frame::expected_len(self.width, self.height)];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(Some(Frame::new(self.width, self.height, data)))
            }
            // ein abgeschnittener letzter Frame zählt als Stream-Ende
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> anyhow::Result<SourceRead> {
        if let Some(frame) = self.pending.take() {
            return Ok(SourceRead::Frame(frame));
        }

        match self.read_raw()? {
            Some(frame) => Ok(SourceRead::Frame(frame)),
            None => {
                warn!(
                    "[source] {} ended after {} frames",
                    self.address, self.frames_read
                );
                Ok(SourceRead::EndOfStream)
            }
        }
    }

    fn describe(&self) -> String {
        format!("ffmpeg:{}", self.address)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A bare device index ("0") selects `/dev/video<N>`, RTSP goes over TCP,
/// anything else is handed to ffmpeg as-is (files, http, ...).
pub fn input_args(address: &str, width: u32, height: u32, fps: u32) -> Vec<String> {
    if let Ok(index) = address.parse::<u32>() {
        return vec![
            "-f".into(),
            "v4l2".into(),
            "-framerate".into(),
            fps.to_string(),
            "-video_size".into(),
            format!("{}x{}", width, height),
            "-i".into(),
            format!("/dev/video{}", index),
        ];
    }

    if address.starts_with("rtsp://") {
        return vec![
            "-rtsp_transport".into(),
            "tcp".into(),
            "-i".into(),
            address.to_string(),
        ];
    }

    vec!["-i".into(), address.to_string()]
}

fn output_args(width: u32, height: u32, fps: u32) -> Vec<String> {
    vec![
        "-an".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "bgr24".into(),
        "-s".into(),
        format!("{}x{}", width, height),
        "-r".into(),
        fps.to_string(),
        "pipe:1".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_maps_to_v4l2() {
        let args = input_args("0", 640, 480, 30);
        assert_eq!(args[1], "v4l2");
        assert!(args.contains(&"640x480".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/dev/video0"));
    }

    #[test]
    fn rtsp_uses_tcp_transport() {
        let args = input_args("rtsp://10.0.0.2/stream1", 640, 480, 30);
        assert_eq!(args[..2], ["-rtsp_transport".to_string(), "tcp".to_string()]);
        assert_eq!(args[3], "rtsp://10.0.0.2/stream1");
    }

    #[test]
    fn missing_binary_is_source_unavailable() {
        let err = FfmpegSource::open("/nonexistent/ffmpeg-bin", "0", 4, 4, 1)
            .err()
            .expect("spawn must fail");
        assert!(matches!(err, RecorderError::SourceUnavailable { .. }));
    }
}
