//! The manipulation pipeline.
//!
//! An [`Api`] owns one backend and a fixed, validated chain of manipulators.
//! [`Api::run`] is a single synchronous pass:
//!
//! ```text
//! source bytes ─decode─▶ Image ─stage₁─▶ Image ─ … ─stageₙ─▶ Image ─encode─▶ Encoded
//! ```
//!
//! Every stage sees the same [`ParameterSet`]. A failure anywhere aborts the
//! run; there is no partial output.
//!
//! The final encode uses the format implied by the image's media type, the
//! quality recorded by the last encoding stage (90 if none ran) and the
//! image's interlace flag.
//!
//! ```no_run
//! use imgpipe::api::Api;
//! use imgpipe::config::LimitsConfig;
//! use imgpipe::imaging::RustBackend;
//! use imgpipe::params::ParameterSet;
//!
//! let api = Api::from_names(
//!     Box::new(RustBackend::new()),
//!     &["size", "encode"],
//!     &LimitsConfig::default(),
//! )?;
//! let source = std::fs::read("photo.png")?;
//! let encoded = api.run(&source, &ParameterSet::from_query("w=800&fm=webp"))?;
//! assert_eq!(encoded.media_type, "image/webp");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::LimitsConfig;
use crate::imaging::{BackendError, Image, ImageBackend, OutputFormat};
use crate::manipulators::{self, Manipulator, ManipulatorError};
use crate::params::ParameterSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to decode source: {0}")]
    Decode(#[source] BackendError),
    #[error("manipulation failed: {0}")]
    Manipulator(#[from] ManipulatorError),
    #[error("failed to encode result: {0}")]
    Encode(#[source] BackendError),
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub format: OutputFormat,
}

pub struct Api {
    backend: Box<dyn ImageBackend>,
    manipulators: Vec<Box<dyn Manipulator>>,
}

impl Api {
    pub fn new(backend: Box<dyn ImageBackend>, manipulators: Vec<Box<dyn Manipulator>>) -> Self {
        Self {
            backend,
            manipulators,
        }
    }

    /// Build the chain from manipulator names, in order.
    ///
    /// Fails on the first unknown name, wherever it appears.
    pub fn from_names<S: AsRef<str>>(
        backend: Box<dyn ImageBackend>,
        names: &[S],
        limits: &LimitsConfig,
    ) -> Result<Self, ApiError> {
        let manipulators = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                manipulators::from_name(name, limits).ok_or_else(|| {
                    ApiError::Configuration(format!(
                        "unknown manipulator '{name}' (known: {})",
                        manipulators::MANIPULATOR_NAMES.join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backend, manipulators))
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    pub fn manipulators(&self) -> &[Box<dyn Manipulator>] {
        &self.manipulators
    }

    /// Names of the chain, in run order.
    pub fn chain(&self) -> Vec<&'static str> {
        self.manipulators.iter().map(|m| m.name()).collect()
    }

    pub fn run(&self, source: &[u8], params: &ParameterSet) -> Result<Encoded, ApiError> {
        let backend = self.backend.as_ref();
        let mut image = backend.decode(source).map_err(ApiError::Decode)?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            media_type = image.media_type(),
            "Decoded source"
        );

        for manipulator in &self.manipulators {
            image = manipulator.run(image, params, backend)?;
        }

        self.serialize(&image)
    }

    fn serialize(&self, image: &Image) -> Result<Encoded, ApiError> {
        let format = image
            .media_type()
            .and_then(OutputFormat::from_media_type)
            .unwrap_or(OutputFormat::Jpg);
        let quality = image.quality().unwrap_or_default();
        let bytes = self
            .backend
            .encode(image, format, quality)
            .map_err(ApiError::Encode)?;
        Ok(Encoded {
            bytes,
            media_type: format.media_type(),
            format,
        })
    }
}
