// src/sink/ffmpeg.rs
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{Context, anyhow, bail};
use log::{debug, warn};

use crate::ring::Frame;
use crate::sink::{SinkParams, VideoSink, VideoWriter};

/// Pipes raw BGR24 frames into an ffmpeg encoder which writes the container.
pub struct FfmpegSink {
    ffmpeg_bin: String,
    codec: String,
}

impl FfmpegSink {
    pub fn new(ffmpeg_bin: impl Into<String>, codec: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            codec: codec.into(),
        }
    }

    fn args(&self, path: &Path, params: SinkParams) -> Vec<String> {
        vec![
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "bgr24".into(),
            "-s".into(),
            format!("{}x{}", params.width, params.height),
            "-r".into(),
            params.fps.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            self.codec.clone(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            path.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new("ffmpeg", "libx264")
    }
}

impl VideoSink for FfmpegSink {
    /// ffmpeg opens the output file after it starts, so a bad target often
    /// shows up only on the first write (broken pipe). The writer then reports
    /// the encoder's exit status instead of the bare pipe error.
    fn open(&self, path: &Path, params: SinkParams) -> anyhow::Result<Box<dyn VideoWriter>> {
        let args = self.args(path, params);
        debug!("[sink] {} {}", self.ffmpeg_bin, args.join(" "));

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawning {}", self.ffmpeg_bin))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            bail!("ffmpeg stdin not captured");
        };

        if let Ok(Some(status)) = child.try_wait() {
            bail!("ffmpeg exited with {} while opening {:?}", status, path);
        }

        Ok(Box::new(FfmpegWriter {
            path: path.to_path_buf(),
            params,
            stdin: Some(BufWriter::new(stdin)),
            child: Some(child),
        }))
    }
}

struct FfmpegWriter {
    path: PathBuf,
    params: SinkParams,
    stdin: Option<BufWriter<ChildStdin>>,
    child: Option<Child>,
}

impl FfmpegWriter {
    fn encoder_gone(&mut self, e: std::io::Error) -> anyhow::Error {
        self.stdin = None;
        match self.child.take().map(|mut c| c.wait()) {
            Some(Ok(status)) => anyhow!(
                "ffmpeg exited with {} before accepting frames for {:?}",
                status,
                self.path
            ),
            _ => anyhow!(e).context(format!("writing to ffmpeg for {:?}", self.path)),
        }
    }
}

impl VideoWriter for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if frame.width != self.params.width || frame.height != self.params.height {
            bail!(
                "frame {} is {}x{}, writer expects {}x{}",
                frame.seq,
                frame.width,
                frame.height,
                self.params.width,
                self.params.height
            );
        }

        if !frame.is_well_formed() {
            bail!(
                "frame {} has {} bytes, expected {}",
                frame.seq,
                frame.data.len(),
                Frame::expected_len(frame.width, frame.height)
            );
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("writer for {:?} already closed", self.path))?;
        if let Err(e) = stdin.write_all(&frame.data) {
            if e.kind() == ErrorKind::BrokenPipe {
                return Err(self.encoder_gone(e));
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        // stdin schließen → ffmpeg finalisiert den Container
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush(),
            None => Ok(()),
        };

        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                bail!("ffmpeg exited with {} for {:?}", status, self.path);
            }
        }

        flushed?;
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.close() {
                warn!("[sink] close on drop failed: {}", e);
            }
        }
    }
}
