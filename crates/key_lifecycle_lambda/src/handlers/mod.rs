pub mod dispatcher;
pub mod event;
