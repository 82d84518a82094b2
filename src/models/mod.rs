mod client;
mod compensation;
mod invoice;
mod payment;
mod user;
mod webhook_event;

pub use client::*;
pub use compensation::*;
pub use invoice::*;
pub use payment::*;
pub use user::*;
pub use webhook_event::*;
