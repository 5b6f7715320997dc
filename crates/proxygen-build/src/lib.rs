//! Container image recipe generation and build context assembly.
//!
//! # Bundle pipeline
//!
//! ```text
//! proxygen bundle
//!   1. Inputs     ── DependencyLayer::load(): manifest + lock cross-check
//!   2. Recipe     ── .proxygen/Dockerfile if ejected, else DockerfileGenerator::render()
//!   3. Context    ── manifest, lock, sources, entry module → .proxygen-context/
//! ```
//!
//! # Layer strategy
//!
//! The recipe copies only the manifest and lock file before installing
//! dependencies, so the dependency layer is rebuilt only when one of those
//! two files changes. Application sources are copied afterwards.
//!
//! The install step always runs the resolver in frozen mode: the locked set
//! is installed exactly, never re-resolved, and the project's own package is
//! left out of the layer.

pub mod context;
pub mod dockerfile;
pub mod eject;
pub mod inputs;

pub use dockerfile::DockerfileGenerator;
pub use inputs::{DependencyLayer, InputError};
