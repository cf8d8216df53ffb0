pub mod analysis;
pub mod blobs;
pub mod events;
pub mod health;
pub mod modules;
pub mod work;
