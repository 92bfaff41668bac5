pub mod base;
pub mod dram;
pub mod sim;
pub mod timeq;
pub mod traffic;
pub mod ui;
