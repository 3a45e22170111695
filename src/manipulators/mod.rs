//! Pipeline stages.
//!
//! A [`Manipulator`] takes the current [`Image`] by value and returns the
//! image the next stage should see. Manipulators hold configuration only;
//! request parameters are passed into [`Manipulator::run`], so a single
//! instance serves any number of concurrent runs.
//!
//! | Name | Stage | Parameters |
//! |---|---|---|
//! | `size` | [`Size`] | `w`, `h`, `dpr`, `fit` |
//! | `encode` | [`Encode`] | `fm`, `q` |
//!
//! Chains are usually built from names found in configuration through
//! [`from_name`]; an unknown name is a configuration error raised by
//! [`Api::from_names`](crate::api::Api::from_names).

pub mod encode;
pub mod size;

pub use encode::Encode;
pub use size::{Fit, Size};

use crate::config::LimitsConfig;
use crate::imaging::{BackendError, Image, ImageBackend};
use crate::params::ParameterSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManipulatorError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("{manipulator}: {message}")]
    Failed {
        manipulator: &'static str,
        message: String,
    },
}

pub trait Manipulator: Send + Sync {
    /// Name used to select this stage in configuration.
    fn name(&self) -> &'static str;

    fn run(
        &self,
        image: Image,
        params: &ParameterSet,
        backend: &dyn ImageBackend,
    ) -> Result<Image, ManipulatorError>;
}

/// Every name [`from_name`] accepts, in the default chain order.
pub const MANIPULATOR_NAMES: &[&str] = &[size::NAME, encode::NAME];

/// Construct a manipulator by its configuration name.
pub fn from_name(name: &str, limits: &LimitsConfig) -> Option<Box<dyn Manipulator>> {
    match name {
        size::NAME => Some(Box::new(Size::new(limits.max_image_size))),
        encode::NAME => Some(Box::new(Encode)),
        _ => None,
    }
}
