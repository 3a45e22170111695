//! ImageMagick backend: pixel work delegated to the `magick` program.
//!
//! Images still live in memory as [`Image`]s between stages. Crossing into
//! ImageMagick always goes through lossless PNG on stdin/stdout:
//!
//! ```text
//! decode:  source bytes ──stdin──▶ magick - png:-        ──stdout──▶ Image
//! encode:  Image as PNG ──stdin──▶ magick png:- [opts] FMT:- ──stdout──▶ bytes
//! ```
//!
//! Progressive output is ImageMagick's plane interlacing
//! ([`Interlace::Plane`] → `-interlace Plane`), which yields progressive JPEG
//! and Adam7 PNG.

use super::backend::{BackendError, BackendKind, ImageBackend, mark_progressive};
use super::format::OutputFormat;
use super::handle::Image;
use super::params::{Interlace, Quality};
use image::ImageFormat;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub const DEFAULT_PROGRAM: &str = "magick";

pub struct MagickBackend {
    program: PathBuf,
}

impl MagickBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the program with `args`, feeding `input` on stdin.
    fn run(&self, args: &[String], input: &[u8]) -> Result<Vec<u8>, BackendError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Unsupported("stdin not captured".into()))?;
        let input = input.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| BackendError::Unsupported("stdin writer panicked".into()))?;

        // A failing program usually closes stdin early; its stderr says more than EPIPE
        if !output.status.success() {
            return Err(BackendError::Process {
                program: self.program.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;
        Ok(output.stdout)
    }
}

impl Default for MagickBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

/// ImageMagick's coder name for an output format.
pub fn coder_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Avif => "AVIF",
        OutputFormat::Gif => "GIF",
        OutputFormat::Jpg | OutputFormat::Pjpg => "JPEG",
        OutputFormat::Png => "PNG",
        OutputFormat::Webp => "WEBP",
        OutputFormat::Tiff => "TIFF",
    }
}

/// Arguments converting decoded source bytes to PNG on stdout.
pub fn decode_args() -> Vec<String> {
    vec!["-".into(), "png:-".into()]
}

/// Arguments encoding PNG on stdin into `format` on stdout.
pub fn encode_args(format: OutputFormat, quality: Quality, interlace: Interlace) -> Vec<String> {
    let mut args = vec!["png:-".to_string()];
    // The encode stage flattens already; this covers jpg output reached without it
    if format == OutputFormat::Jpg || format == OutputFormat::Pjpg {
        args.extend(["-background".into(), "white".into(), "-flatten".into()]);
    }
    args.extend(["-quality".into(), quality.value().to_string()]);

    let interlace = match (format, interlace) {
        (OutputFormat::Pjpg, Interlace::None) => Interlace::Plane,
        (_, scheme) => scheme,
    };
    match interlace {
        Interlace::None => {}
        Interlace::Line => args.extend(["-interlace".into(), "Line".into()]),
        Interlace::Plane => args.extend(["-interlace".into(), "Plane".into()]),
    }

    args.push(format!("{}:-", coder_name(format)));
    args
}

impl ImageBackend for MagickBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Magick
    }

    fn decode(&self, bytes: &[u8]) -> Result<Image, BackendError> {
        let media_type = image::guess_format(bytes)
            .map(|f| f.to_mime_type())
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let png = self.run(&decode_args(), bytes)?;
        let pixels = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Image::new(pixels, Some(media_type)))
    }

    fn encode(
        &self,
        image: &Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut png = Vec::new();
        image
            .pixels()
            .write_with_encoder(image::codecs::png::PngEncoder::new(&mut png))
            .map_err(|e| BackendError::Encode {
                format: OutputFormat::Png,
                message: e.to_string(),
            })?;
        self.run(&encode_args(format, quality, image.interlace()), &png)
    }

    fn set_progressive(&self, image: &mut Image) {
        mark_progressive(image, Interlace::Plane);
    }
}
