mod factory;

pub use factory::*;
