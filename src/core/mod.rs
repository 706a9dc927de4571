pub mod api;
pub mod bucket;
pub mod db;
pub mod directory;
pub mod gate;
pub mod geo;
pub mod normalize;
pub mod participant;
pub mod registration;
pub mod roles;
pub mod settings;

#[cfg(test)]
pub mod memory;
