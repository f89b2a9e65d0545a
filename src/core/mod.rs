pub mod analyzer;
pub mod audio;
pub mod classify;
pub mod composer;
pub mod consequences;
pub mod narrative;
pub mod plan;
pub mod rng;
pub mod session;
pub mod source;
pub mod store;
pub mod story;
pub mod style_profile;
pub mod template;
pub mod theory;
