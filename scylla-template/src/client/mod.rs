//! The template and its builder.

pub mod template;

pub mod template_builder;

pub use template::CqlTemplate;
pub use template_builder::CqlTemplateBuilder;
