mod handler;
mod message;
mod session;

pub use handler::ws_handler;
pub use message::{ClientAction, DecodeError, OutboundMessage, ServerMessage};
pub use session::{Session, SessionPhase};
