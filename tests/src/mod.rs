#[cfg(test)]
pub mod relay_flow_tests;
#[cfg(test)]
pub mod utils;
