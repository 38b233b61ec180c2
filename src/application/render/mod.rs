//! HTML to PDF render pipeline.
//!
//! [`RenderBackend`] admits a request, hands it to a single-use worker that
//! owns a scratch [`Workspace`], and the worker sequences the three steps:
//! print through a headless [`RenderingSurface`], stamp the title through a
//! [`MetadataTool`], read the bytes back. Browser and annotation tool sit
//! behind traits so the pipeline can be exercised with fakes.

mod backend;
mod controller;
mod metadata;
mod surface;
mod types;
mod worker;
mod workspace;

pub use backend::{
    METRIC_RENDER_DURATION_MS, METRIC_RENDER_IN_FLIGHT, METRIC_RENDER_TOTAL, RenderBackend,
    RenderConfigError, RenderOptions,
};
pub use metadata::{MetadataTool, decode_tool_output};
pub use surface::{Readiness, RenderingSurface, SurfaceError, SurfaceLauncher};
pub use types::{
    PAGE_NUMBER_PLACEHOLDER, PrintConfiguration, RenderError, RenderResult,
    TOTAL_PAGES_PLACEHOLDER,
};
pub use workspace::Workspace;
