//! # gosl: Go Shader Language
//!
//! Translates annotated Go code into WGSL compute shaders, so that the same
//! functions run on the CPU in Go and on the GPU as kernels.
//!
//! Code to translate lives between `//gosl:start` and `//gosl:end` comments.
//! Global GPU buffers are declared in a `//gosl:vars` block, and every
//! function marked `//gosl:kernel` becomes one self-contained
//! `<Kernel>.wgsl` file holding only the code reachable from it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gosl::{run, Config};
//!
//! let config = Config {
//!     keep: true,
//!     ..Config::default()
//! };
//! let summary = run(config, "./sim")?;
//! for path in &summary.kernels {
//!     println!("wrote {}", path.display());
//! }
//! # Ok::<(), gosl::GoslError>(())
//! ```
//!
//! ## Architecture
//!
//! gosl follows a multi-phase pipeline:
//!
//! 1. **Scan** - Find tagged files in the package and its `//gosl:import`s
//! 2. **Extract** - Write the `//gosl:` regions to `<out>/imports` as one package
//! 3. **Load** - Parse and type the extracted package, check struct layout
//! 4. **Call Graph** - Record calls, atomics and buffer variables
//! 5. **Kernels** - Print each kernel's closure as WGSL with bindings and support code
//! 6. **Host Bindings** - Write `gosl.go` and the `gosl.json` manifest

pub mod align;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod diag;
pub mod directives;
pub mod error;
pub mod extract;
pub mod gengpu;
pub mod go;
pub mod kernel;
pub mod scan;
pub mod sledits;
pub mod state;
pub mod wgsl;

// Re-export the main translation API
pub use compiler::{run, Summary};
pub use config::Config;
pub use diag::Diagnostic;
pub use error::{GoslError, Result};
