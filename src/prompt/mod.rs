//! Prompt System - built-in templates rendered with Handlebars

mod render;
pub mod templates;

pub use render::PromptRenderer;
