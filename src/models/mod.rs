pub mod quiz;
pub mod quiz_change;
pub mod result;
pub mod session;
