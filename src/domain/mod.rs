pub mod cube;
pub mod keymap;
pub mod models;
pub mod move_table;
pub mod reconciler;
pub mod scramble;
pub mod settings;
