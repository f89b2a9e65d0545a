pub mod analysis;
pub mod commit;
pub mod scene;
pub mod state;
pub mod style;
