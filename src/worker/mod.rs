//! Worker lifecycle: event routing, host capabilities and the request loop.

pub mod channel;
pub mod dispatcher;
pub mod events;
pub mod host;
pub mod registration;

pub use channel::{WorkerClient, WorkerServer, worker_channel};
pub use dispatcher::{WorkerDispatcher, WorkerState};
pub use events::{EventOutcome, WorkerEvent};
pub use host::{ClientInfo, WorkerHost};
pub use registration::{RegistrationReport, register_periodic_check};
