pub mod ai;
pub mod db;
pub mod grocery;
pub mod models;
pub mod recipe;
pub mod service;
pub mod store;
pub mod totals;
