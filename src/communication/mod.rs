pub mod bus;
pub mod messages;
