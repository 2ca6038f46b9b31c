pub mod alias;
pub mod breaker;
pub mod bulk;
pub mod worker;
