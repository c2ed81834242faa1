pub mod bus;
pub mod event;
pub mod scheduler;
pub mod state;
pub mod time;
