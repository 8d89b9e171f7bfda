//! Integration test suite modules

mod gate_flow;
mod jj_driver;
mod protocol;
