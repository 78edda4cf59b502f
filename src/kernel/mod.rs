pub mod boundary;
pub mod context;
pub mod event;
pub mod gate;
pub mod reactor;
pub mod telemetry;
pub mod thread;
pub mod time;
