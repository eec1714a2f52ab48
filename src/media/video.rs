//! Final video assembly.
//!
//! Each slide image becomes a still clip, each transition is trimmed around
//! its midpoint, and everything is concatenated in order:
//! `[slide 1] [transition 1] [slide 2] ... [slide n]`.
//!
//! All encoding goes through the [`MediaTool`] trait; [`Ffmpeg`] is the
//! implementation that shells out to `ffmpeg` and `ffprobe`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ConfigError, MediaError, Result};

/// Frame rate of generated still clips.
pub const DEFAULT_FPS: u32 = 30;
/// Shortest hold for a slide when narration is one shared track.
pub const MIN_SHARED_SLIDE_SECONDS: f64 = 1.0;

/// A still image held on screen for a fixed time.
#[derive(Debug, Clone, PartialEq)]
pub struct StillClip {
    pub image: PathBuf,
    /// Narration muxed into the clip; `None` renders a silent clip.
    pub audio: Option<PathBuf>,
    pub duration: f64,
    pub fps: u32,
    pub output: PathBuf,
}

/// Summary of one stream in a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Container and stream summary of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration of the file in seconds.
    pub duration_seconds: Option<f64>,
    /// Container format name as reported by the probe (e.g. "mov,mp4,m4a").
    pub format_name: Option<String>,
    /// File size in bytes.
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    pub streams: Vec<StreamInfo>,
}

impl VideoInfo {
    pub fn has_video(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("video"))
    }

    pub fn has_audio(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse `ffprobe -print_format json` output.
pub fn parse_probe_output(json: &str) -> std::result::Result<VideoInfo, serde_json::Error> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let (duration, format_name, size, bit_rate) = match probe.format {
        Some(f) => (f.duration, f.format_name, f.size, f.bit_rate),
        None => (None, None, None, None),
    };

    Ok(VideoInfo {
        duration_seconds: duration.and_then(|d| d.trim().parse().ok()),
        format_name,
        size_bytes: size.and_then(|s| s.parse().ok()),
        bit_rate: bit_rate.and_then(|b| b.parse().ok()),
        streams: probe
            .streams
            .into_iter()
            .map(|s| StreamInfo {
                index: s.index,
                codec_type: s.codec_type,
                codec_name: s.codec_name,
                width: s.width,
                height: s.height,
            })
            .collect(),
    })
}

/// Local media encoder.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Duration of an audio or video file, in seconds.
    async fn duration(&self, file: &Path) -> std::result::Result<f64, MediaError>;

    /// Container and stream summary.
    async fn probe(&self, file: &Path) -> std::result::Result<VideoInfo, MediaError>;

    /// Render a still image as a clip.
    async fn still_clip(&self, clip: &StillClip) -> std::result::Result<(), MediaError>;

    /// Cut `duration` seconds starting at `start`, dropping audio.
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> std::result::Result<(), MediaError>;

    /// Concatenate the segments listed in `manifest`, optionally laying
    /// `audio` over the whole result.
    async fn concat(
        &self,
        manifest: &Path,
        output: &Path,
        audio: Option<&Path>,
    ) -> std::result::Result<(), MediaError>;
}

/// `ffmpeg` / `ffprobe` subprocess implementation of [`MediaTool`].
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Use the tool paths resolved in settings.
    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(settings.ffmpeg()?, settings.ffprobe()?))
    }

    fn probe_args(file: &Path, streams: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-v", "quiet", "-print_format", "json", "-show_format"]
            .into_iter()
            .map(OsString::from)
            .collect();
        if streams {
            args.push("-show_streams".into());
        }
        args.push(file.into());
        args
    }

    fn still_clip_args(clip: &StillClip) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-loop".into(), "1".into()];
        args.push("-i".into());
        args.push(clip.image.as_os_str().into());
        if let Some(audio) = &clip.audio {
            args.push("-i".into());
            args.push(audio.as_os_str().into());
        }
        args.push("-c:v".into());
        args.push("libx264".into());
        if clip.audio.is_some() {
            args.push("-c:a".into());
            args.push("aac".into());
        }
        args.push("-pix_fmt".into());
        args.push("yuv420p".into());
        args.push("-t".into());
        args.push(clip.duration.to_string().into());
        args.push("-r".into());
        args.push(clip.fps.to_string().into());
        if clip.audio.is_some() {
            args.push("-shortest".into());
        }
        args.push(clip.output.as_os_str().into());
        args
    }

    fn trim_args(input: &Path, output: &Path, start: f64, duration: f64) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-ss".into(),
            start.to_string().into(),
            "-i".into(),
            input.into(),
            "-t".into(),
            duration.to_string().into(),
            "-c:v".into(),
            "libx264".into(),
            "-an".into(),
            output.into(),
        ]
    }

    fn concat_args(manifest: &Path, output: &Path, audio: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            manifest.into(),
        ];
        if let Some(audio) = audio {
            args.extend(["-i".into(), audio.into()]);
            args.extend(["-map", "0:v", "-map", "1:a"].map(OsString::from));
        }
        args.extend(["-c:v", "libx264", "-c:a", "aac"].map(OsString::from));
        if audio.is_some() {
            args.push("-shortest".into());
        }
        args.extend(["-movflags", "+faststart"].map(OsString::from));
        args.push(output.into());
        args
    }

    async fn run(
        tool: &Path,
        args: &[OsString],
        stage: &str,
    ) -> std::result::Result<std::process::Output, MediaError> {
        let name = tool
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| tool.display().to_string());
        tracing::debug!(tool = %name, stage, "Running encoder");

        let output = tokio::process::Command::new(tool)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| MediaError::EncoderFailed {
                tool: name.clone(),
                stage: stage.to_string(),
                stderr: format!("failed to start: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::EncoderFailed {
                tool: name,
                stage: stage.to_string(),
                stderr: tail(stderr.trim(), 2000).to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn duration(&self, file: &Path) -> std::result::Result<f64, MediaError> {
        let output = Self::run(&self.ffprobe, &Self::probe_args(file, false), "probing duration")
            .await
            .map_err(|e| MediaError::ProbeFailed {
                path: file.to_path_buf(),
                reason: e.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout)
            .ok()
            .and_then(|info| info.duration_seconds)
            .ok_or_else(|| MediaError::ProbeFailed {
                path: file.to_path_buf(),
                reason: "no format duration in probe output".to_string(),
            })
    }

    async fn probe(&self, file: &Path) -> std::result::Result<VideoInfo, MediaError> {
        let output = Self::run(&self.ffprobe, &Self::probe_args(file, true), "probing").await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout).map_err(|e| MediaError::ProbeFailed {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn still_clip(&self, clip: &StillClip) -> std::result::Result<(), MediaError> {
        Self::run(&self.ffmpeg, &Self::still_clip_args(clip), "creating slide video").await?;
        Ok(())
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> std::result::Result<(), MediaError> {
        let args = Self::trim_args(input, output, start, duration);
        Self::run(&self.ffmpeg, &args, "trimming transition").await?;
        Ok(())
    }

    async fn concat(
        &self,
        manifest: &Path,
        output: &Path,
        audio: Option<&Path>,
    ) -> std::result::Result<(), MediaError> {
        let args = Self::concat_args(manifest, output, audio);
        Self::run(&self.ffmpeg, &args, "concatenating").await?;
        Ok(())
    }
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Where narration comes from during assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyAudio {
    /// One narration clip per slide, muxed into each slide clip.
    PerSlide(Vec<PathBuf>),
    /// One continuous track laid over the whole video.
    Shared(PathBuf),
}

/// Everything needed for one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyJob {
    pub slides: Vec<PathBuf>,
    pub audio: AssemblyAudio,
    pub transitions: Vec<PathBuf>,
    pub output: PathBuf,
    /// Scratch directory owned by this job. Defaults to a fresh
    /// `temp/assembly-<uuid>` next to the output, never a shared directory.
    pub temp_dir: PathBuf,
    /// Target length of each trimmed transition, in seconds.
    pub transition_duration: f64,
    /// Remove `temp_dir` after a successful encode.
    pub cleanup: bool,
}

impl AssemblyJob {
    pub fn new(
        slides: Vec<PathBuf>,
        audio: AssemblyAudio,
        transitions: Vec<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let output = output.into();
        let scratch = format!("assembly-{}", uuid::Uuid::new_v4());
        let temp_dir = output
            .parent()
            .map(|p| p.join("temp"))
            .unwrap_or_else(|| PathBuf::from("temp"))
            .join(scratch);
        Self {
            slides,
            audio,
            transitions,
            output,
            temp_dir,
            transition_duration: crate::presentation::DEFAULT_TRANSITION_DURATION,
            cleanup: true,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_transition_duration(mut self, seconds: f64) -> Self {
        self.transition_duration = seconds;
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Start offset that keeps the middle `target` seconds of a `full`-second clip.
pub fn transition_offset(full: f64, target: f64) -> f64 {
    ((full - target) / 2.0).max(0.0)
}

/// Hold time per slide when a single narration track covers the whole video.
pub fn shared_slide_duration(
    audio_seconds: f64,
    slides: usize,
    transitions: usize,
    transition_duration: f64,
) -> f64 {
    if slides == 0 {
        return MIN_SHARED_SLIDE_SECONDS;
    }
    let available = audio_seconds - transitions as f64 * transition_duration;
    (available / slides as f64).max(MIN_SHARED_SLIDE_SECONDS)
}

/// Line for one segment in an ffmpeg concat manifest.
fn manifest_line(path: &Path) -> std::io::Result<String> {
    let absolute = std::path::absolute(path)?;
    let normalized = absolute.to_string_lossy().replace('\\', "/");
    Ok(format!("file '{}'", normalized.replace('\'', "'\\''")))
}

/// Combines slides, narration and transitions into the final video.
pub struct VideoAssembler {
    tool: Arc<dyn MediaTool>,
    fps: u32,
}

impl VideoAssembler {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self {
            tool,
            fps: DEFAULT_FPS,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Duration of an audio or video file, in seconds.
    pub async fn duration(&self, file: &Path) -> Result<f64> {
        Ok(self.tool.duration(file).await?)
    }

    /// Container and stream summary of a media file.
    pub async fn probe_info(&self, file: &Path) -> Result<VideoInfo> {
        Ok(self.tool.probe(file).await?)
    }

    /// Hold `image` for the length of `audio`, muxing the narration in.
    pub async fn build_slide_clip(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
        fps: u32,
    ) -> Result<()> {
        let duration = self.duration(audio).await?;
        self.tool
            .still_clip(&StillClip {
                image: image.to_path_buf(),
                audio: Some(audio.to_path_buf()),
                duration,
                fps,
                output: output.to_path_buf(),
            })
            .await?;
        Ok(())
    }

    /// Keep the middle `target` seconds of a transition, without audio.
    pub async fn trim_transition(&self, input: &Path, output: &Path, target: f64) -> Result<()> {
        let full = self.duration(input).await?;
        let start = transition_offset(full, target);
        self.tool.trim(input, output, start, target).await?;
        Ok(())
    }

    /// Write an ffmpeg concat manifest listing `segments` in order.
    pub async fn write_concat_manifest(&self, segments: &[PathBuf], path: &Path) -> Result<()> {
        let mut body = String::new();
        for segment in segments {
            body.push_str(&manifest_line(segment).map_err(MediaError::from)?);
            body.push('\n');
        }
        tokio::fs::write(path, body)
            .await
            .map_err(MediaError::from)?;
        Ok(())
    }

    /// Encode the final video. Temp files are kept when anything fails.
    pub async fn assemble(&self, job: &AssemblyJob) -> Result<PathBuf> {
        if let AssemblyAudio::PerSlide(audio) = &job.audio
            && audio.len() != job.slides.len()
        {
            return Err(MediaError::CountMismatch {
                slides: job.slides.len(),
                audio: audio.len(),
            }
            .into());
        }
        if job.slides.is_empty() {
            return Err(MediaError::ProcessingFailed {
                reason: "no slides to assemble".to_string(),
            }
            .into());
        }
        let expected = job.slides.len() - 1;
        if job.transitions.len() != expected {
            tracing::warn!(
                transitions = job.transitions.len(),
                expected,
                "Transition count does not match slide gaps"
            );
        }

        tokio::fs::create_dir_all(&job.temp_dir)
            .await
            .map_err(MediaError::from)?;
        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::from)?;
        }

        match self.encode(job).await {
            Ok(()) => {
                tracing::info!(path = %job.output.display(), "Final video saved");
                if job.cleanup
                    && let Err(e) = tokio::fs::remove_dir_all(&job.temp_dir).await
                {
                    tracing::warn!(path = %job.temp_dir.display(), error = %e, "Could not remove temp files");
                }
                Ok(job.output.clone())
            }
            Err(e) => {
                tracing::error!(error = %e, "Assembly failed");
                tracing::warn!(path = %job.temp_dir.display(), "Temp files preserved");
                Err(e)
            }
        }
    }

    async fn encode(&self, job: &AssemblyJob) -> Result<()> {
        let total = job.slides.len();
        let shared_hold = match &job.audio {
            AssemblyAudio::Shared(track) => {
                let audio_seconds = self.duration(track).await?;
                let hold = shared_slide_duration(
                    audio_seconds,
                    total,
                    job.transitions.len(),
                    job.transition_duration,
                );
                tracing::info!(audio_seconds, per_slide = hold, "Timing slides to shared narration");
                Some(hold)
            }
            AssemblyAudio::PerSlide(_) => None,
        };

        let mut segments = Vec::with_capacity(total + job.transitions.len());
        for (i, image) in job.slides.iter().enumerate() {
            let number = i + 1;
            let clip = job.temp_dir.join(format!("slide_{:02}.mp4", number));
            tracing::info!(segment = number, total, "Creating slide segment");
            match (&job.audio, shared_hold) {
                (AssemblyAudio::PerSlide(audio), _) => {
                    self.build_slide_clip(image, &audio[i], &clip, self.fps)
                        .await?
                }
                (AssemblyAudio::Shared(_), hold) => {
                    self.tool
                        .still_clip(&StillClip {
                            image: image.clone(),
                            audio: None,
                            duration: hold.unwrap_or(MIN_SHARED_SLIDE_SECONDS),
                            fps: self.fps,
                            output: clip.clone(),
                        })
                        .await?
                }
            }
            segments.push(clip);

            if let Some(transition) = job.transitions.get(i).filter(|_| number < total) {
                let trimmed = job.temp_dir.join(format!("trans_{:02}_trim.mp4", number));
                tracing::info!(transition = number, "Trimming transition");
                self.trim_transition(transition, &trimmed, job.transition_duration)
                    .await?;
                segments.push(trimmed);
            }
        }

        let manifest = job.temp_dir.join("concat.txt");
        self.write_concat_manifest(&segments, &manifest).await?;

        tracing::info!(segments = segments.len(), "Concatenating segments");
        let shared_track = match &job.audio {
            AssemblyAudio::Shared(track) => Some(track.as_path()),
            AssemblyAudio::PerSlide(_) => None,
        };
        self.tool
            .concat(&manifest, &job.output, shared_track)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Duration(PathBuf),
        Still(StillClip),
        Trim { start: f64, duration: f64 },
        Concat { lines: Vec<String>, audio: Option<PathBuf> },
    }

    #[derive(Default)]
    struct FakeTool {
        durations: HashMap<PathBuf, f64>,
        ops: Mutex<Vec<Op>>,
        fail_concat: bool,
    }

    #[async_trait]
    impl MediaTool for FakeTool {
        async fn duration(&self, file: &Path) -> std::result::Result<f64, MediaError> {
            self.ops.lock().unwrap().push(Op::Duration(file.to_path_buf()));
            self.durations
                .get(file)
                .copied()
                .ok_or_else(|| MediaError::ProbeFailed {
                    path: file.to_path_buf(),
                    reason: "unknown".into(),
                })
        }

        async fn probe(&self, _file: &Path) -> std::result::Result<VideoInfo, MediaError> {
            Err(MediaError::ProcessingFailed {
                reason: "not used".into(),
            })
        }

        async fn still_clip(&self, clip: &StillClip) -> std::result::Result<(), MediaError> {
            std::fs::write(&clip.output, b"clip")?;
            self.ops.lock().unwrap().push(Op::Still(clip.clone()));
            Ok(())
        }

        async fn trim(
            &self,
            _input: &Path,
            output: &Path,
            start: f64,
            duration: f64,
        ) -> std::result::Result<(), MediaError> {
            std::fs::write(output, b"trim")?;
            self.ops.lock().unwrap().push(Op::Trim { start, duration });
            Ok(())
        }

        async fn concat(
            &self,
            manifest: &Path,
            output: &Path,
            audio: Option<&Path>,
        ) -> std::result::Result<(), MediaError> {
            let lines = std::fs::read_to_string(manifest)?
                .lines()
                .map(str::to_string)
                .collect();
            self.ops.lock().unwrap().push(Op::Concat {
                lines,
                audio: audio.map(Path::to_path_buf),
            });
            if self.fail_concat {
                return Err(MediaError::EncoderFailed {
                    tool: "ffmpeg".into(),
                    stage: "concatenating".into(),
                    stderr: "Invalid data found".into(),
                });
            }
            std::fs::write(output, b"video")?;
            Ok(())
        }
    }

    fn paths(dir: &Path, prefix: &str, ext: &str, n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| dir.join(format!("{}_{:02}.{}", prefix, i, ext)))
            .collect()
    }

    #[test]
    fn test_transition_offset() {
        assert_eq!(transition_offset(5.0, 2.5), 1.25);
        assert_eq!(transition_offset(2.0, 2.5), 0.0);
        assert_eq!(transition_offset(2.5, 2.5), 0.0);
    }

    #[test]
    fn test_shared_slide_duration() {
        assert_eq!(shared_slide_duration(60.0, 5, 4, 2.5), 10.0);
        assert_eq!(shared_slide_duration(5.0, 3, 2, 2.5), 1.0);
        assert_eq!(shared_slide_duration(5.0, 0, 0, 2.5), 1.0);
    }

    #[test]
    fn test_still_clip_args() {
        let clip = StillClip {
            image: "s.png".into(),
            audio: Some("n.mp3".into()),
            duration: 12.5,
            fps: 30,
            output: "o.mp4".into(),
        };
        let args: Vec<String> = Ffmpeg::still_clip_args(&clip)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args.join(" "),
            "-y -loop 1 -i s.png -i n.mp3 -c:v libx264 -c:a aac -pix_fmt yuv420p -t 12.5 -r 30 -shortest o.mp4"
        );

        let silent = StillClip { audio: None, ..clip };
        let args: Vec<String> = Ffmpeg::still_clip_args(&silent)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(!args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_trim_and_concat_args() {
        let trim: Vec<String> = Ffmpeg::trim_args(Path::new("t.mp4"), Path::new("o.mp4"), 1.25, 2.5)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(trim.join(" "), "-y -ss 1.25 -i t.mp4 -t 2.5 -c:v libx264 -an o.mp4");

        let concat: Vec<String> = Ffmpeg::concat_args(Path::new("c.txt"), Path::new("o.mp4"), None)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            concat.join(" "),
            "-y -f concat -safe 0 -i c.txt -c:v libx264 -c:a aac -movflags +faststart o.mp4"
        );

        let shared: Vec<String> =
            Ffmpeg::concat_args(Path::new("c.txt"), Path::new("o.mp4"), Some(Path::new("a.mp3")))
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
        assert!(shared.join(" ").contains("-i a.mp3 -map 0:v -map 1:a"));
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(
            r#"{
                "streams": [
                    {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                    {"index": 1, "codec_type": "audio", "codec_name": "aac"}
                ],
                "format": {"duration": "42.500000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "size": "1048576", "bit_rate": "197345"}
            }"#,
        )
        .unwrap();
        assert_eq!(info.duration_seconds, Some(42.5));
        assert_eq!(info.size_bytes, Some(1_048_576));
        assert!(info.has_video());
        assert!(info.has_audio());
        assert_eq!(info.streams[0].width, Some(1920));

        let empty = parse_probe_output("{}").unwrap();
        assert_eq!(empty.duration_seconds, None);
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_manifest_line_is_absolute_and_quoted() {
        let line = manifest_line(Path::new("/tmp/it's/slide_01.mp4")).unwrap();
        assert_eq!(line, "file '/tmp/it'\\''s/slide_01.mp4'");
        let relative = manifest_line(Path::new("temp/slide_01.mp4")).unwrap();
        assert!(relative.starts_with("file '/"));
        assert!(!relative.contains('\\'));
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_trim_transition_uses_midpoint() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("transition_01.mp4");
        let tool = Arc::new(FakeTool {
            durations: HashMap::from([(input.clone(), 5.0)]),
            ..Default::default()
        });
        let assembler = VideoAssembler::new(tool.clone());

        assembler
            .trim_transition(&input, &dir.path().join("out.mp4"), 2.5)
            .await
            .unwrap();

        let ops = tool.ops.lock().unwrap();
        assert_eq!(ops[1], Op::Trim { start: 1.25, duration: 2.5 });
    }

    #[tokio::test]
    async fn test_count_mismatch_fails_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::default());
        let assembler = VideoAssembler::new(tool.clone());
        let job = AssemblyJob::new(
            paths(dir.path(), "slide", "png", 3),
            AssemblyAudio::PerSlide(paths(dir.path(), "narration", "mp3", 2)),
            paths(dir.path(), "transition", "mp4", 2),
            dir.path().join("out.mp4"),
        );

        let err = assembler.assemble(&job).await.unwrap_err();
        assert!(err.to_string().contains("Slide count (3) must match audio count (2)"));
        assert!(tool.ops.lock().unwrap().is_empty());
        assert!(!job.temp_dir.exists());
    }

    #[tokio::test]
    async fn test_assemble_per_slide_interleaves_segments() {
        let dir = tempfile::tempdir().unwrap();
        let slides = paths(dir.path(), "slide", "png", 3);
        let audio = paths(dir.path(), "narration", "mp3", 3);
        let transitions = paths(dir.path(), "transition", "mp4", 2);
        let mut durations: HashMap<PathBuf, f64> =
            audio.iter().map(|p| (p.clone(), 10.0)).collect();
        durations.extend(transitions.iter().map(|p| (p.clone(), 5.0)));
        let tool = Arc::new(FakeTool {
            durations,
            ..Default::default()
        });
        let assembler = VideoAssembler::new(tool.clone());
        let job = AssemblyJob::new(
            slides,
            AssemblyAudio::PerSlide(audio),
            transitions,
            dir.path().join("final").join("out.mp4"),
        )
        .with_temp_dir(dir.path().join("temp"));

        let out = assembler.assemble(&job).await.unwrap();
        assert!(out.exists());
        assert!(!dir.path().join("temp").exists());

        let ops = tool.ops.lock().unwrap();
        let Some(Op::Concat { lines, audio }) = ops.last() else {
            panic!("concat was not last");
        };
        assert_eq!(audio, &None);
        let names: Vec<&str> = lines
            .iter()
            .map(|l| l.rsplit('/').next().unwrap().trim_end_matches('\''))
            .collect();
        assert_eq!(
            names,
            vec![
                "slide_01.mp4",
                "trans_01_trim.mp4",
                "slide_02.mp4",
                "trans_02_trim.mp4",
                "slide_03.mp4"
            ]
        );
    }

    #[tokio::test]
    async fn test_assemble_shared_audio_holds_slides_evenly() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("narration_full.mp3");
        let transitions = paths(dir.path(), "transition", "mp4", 1);
        let mut durations = HashMap::from([(track.clone(), 25.0)]);
        durations.insert(transitions[0].clone(), 5.0);
        let tool = Arc::new(FakeTool {
            durations,
            ..Default::default()
        });
        let assembler = VideoAssembler::new(tool.clone());
        let job = AssemblyJob::new(
            paths(dir.path(), "slide", "png", 2),
            AssemblyAudio::Shared(track.clone()),
            transitions,
            dir.path().join("out.mp4"),
        )
        .with_temp_dir(dir.path().join("temp"))
        .with_cleanup(false);

        assembler.assemble(&job).await.unwrap();
        assert!(dir.path().join("temp").join("concat.txt").exists());

        let ops = tool.ops.lock().unwrap();
        let holds: Vec<(f64, bool)> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Still(c) => Some((c.duration, c.audio.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(holds, vec![(11.25, false), (11.25, false)]);
        assert!(matches!(ops.last(), Some(Op::Concat { audio: Some(a), .. }) if a == &track));
    }

    #[tokio::test]
    async fn test_failed_concat_keeps_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let audio = paths(dir.path(), "narration", "mp3", 1);
        let tool = Arc::new(FakeTool {
            durations: HashMap::from([(audio[0].clone(), 3.0)]),
            fail_concat: true,
            ..Default::default()
        });
        let assembler = VideoAssembler::new(tool);
        let job = AssemblyJob::new(
            paths(dir.path(), "slide", "png", 1),
            AssemblyAudio::PerSlide(audio),
            vec![],
            dir.path().join("out.mp4"),
        )
        .with_temp_dir(dir.path().join("temp"));

        let err = assembler.assemble(&job).await.unwrap_err();
        assert!(err.to_string().contains("ffmpeg failed while concatenating"));
        assert!(dir.path().join("temp").join("slide_01.mp4").exists());
    }

    #[tokio::test]
    async fn test_cleanup_spares_existing_temp_contents() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("temp");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("notes.txt"), b"keep me").unwrap();

        let audio = paths(dir.path(), "narration", "mp3", 1);
        let tool = Arc::new(FakeTool {
            durations: HashMap::from([(audio[0].clone(), 3.0)]),
            ..Default::default()
        });
        let job = AssemblyJob::new(
            paths(dir.path(), "slide", "png", 1),
            AssemblyAudio::PerSlide(audio),
            vec![],
            dir.path().join("out.mp4"),
        );
        assert!(job.temp_dir.starts_with(&shared));
        assert_ne!(job.temp_dir, shared);

        VideoAssembler::new(tool).assemble(&job).await.unwrap();
        assert!(!job.temp_dir.exists());
        assert!(shared.join("notes.txt").exists());
    }

    #[test]
    fn test_default_temp_dirs_are_unique() {
        let a = AssemblyJob::new(vec![], AssemblyAudio::Shared("a.mp3".into()), vec![], "out.mp4");
        let b = AssemblyJob::new(vec![], AssemblyAudio::Shared("a.mp3".into()), vec![], "out.mp4");
        assert_ne!(a.temp_dir, b.temp_dir);
    }
}
