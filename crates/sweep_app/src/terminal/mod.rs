mod app;
mod effects;
pub mod render;

pub use app::run;
