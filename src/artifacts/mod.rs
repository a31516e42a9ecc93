//! Artifact generation: deterministic on-disk layout, CSS inlining for
//! email bodies, subprocess document rendering, and the idempotent batch
//! generator that ties them together.

pub mod generator;
pub mod inline;
pub mod layout;
pub mod render;

pub use generator::{
    GenerateError, GenerationReport, GeneratorOptions, collate_letters, generate_wave,
};
pub use inline::{InlineCssError, inline_email_css};
pub use layout::ArtifactLayout;
pub use render::{
    DocumentRenderer, FetchError, HttpMessageSource, MessageSource, RenderError,
    SubprocessRenderer,
};
