pub mod jwt;
pub mod problem;
pub mod result;
pub mod util;
