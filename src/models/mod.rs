pub mod incident;
pub mod junction;
pub mod recommendation;
pub mod seed;
