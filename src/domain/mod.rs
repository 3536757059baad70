pub mod ai;
pub mod compass;
pub mod entity;
pub mod map;
pub mod rules;
pub mod tile;
pub mod trail;
