//! Page and menu orchestrations built on the optimizer.

pub mod error;
pub mod menu;
pub mod page;
pub mod queries;

#[cfg(test)]
mod testing;
