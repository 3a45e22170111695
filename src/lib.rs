//! # imgpipe
//!
//! A parameter-driven image manipulation pipeline. A source image is decoded,
//! handed through an ordered chain of manipulators that all read the same
//! request parameters, and serialized back to bytes.
//!
//! # Architecture
//!
//! ```text
//! bytes ─decode─▶ Image ─size─▶ Image ─encode─▶ Image ─serialize─▶ Encoded
//! ```
//!
//! Every stage reads the same [`params::ParameterSet`] (`w`, `h`, `fit`,
//! `dpr`, `fm`, `q`, `p`).
//!
//! The chain is fixed when an [`api::Api`] is built and is never mutated by a
//! run, so one `Api` can serve many images concurrently. Per-request state
//! lives only in the [`params::ParameterSet`] passed to each run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`api`] | The pipeline: decode, run the chain, serialize |
//! | [`manipulators`] | The `Manipulator` trait and the `size` and `encode` stages |
//! | [`params`] | Request parameters, query-string parsing, preset expansion |
//! | [`imaging`] | Image handle, output formats, quality, interlacing and the two backends |
//! | [`config`] | `imgpipe.toml` loading, stock defaults and validation |
//! | [`process`] | Parallel batch runs over a directory with an output cache |
//! | [`cache`] | Content-addressed cache manifest used by batch runs |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Backends
//!
//! Two [`imaging::ImageBackend`] implementations exist. The default is pure
//! Rust (`image`, `jpeg-encoder`, and a small Adam7 PNG writer) and needs no
//! system packages. The ImageMagick backend shells out to `magick` and is
//! selected with `backend = "magick"` in the config. Both honour the same
//! format, quality and interlace decisions; they differ only in which
//! interlace mode "progressive" maps to.
//!
//! # Lenient Parameters
//!
//! Parameter values never fail a request. An unknown `fm` falls back to the
//! source format, an out-of-range `q` to 90, a malformed `w` is ignored.
//! Errors are reserved for things that are actually broken: an undecodable
//! source, a failing backend, a misconfigured chain.

pub mod api;
pub mod cache;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod manipulators;
pub mod output;
pub mod params;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
