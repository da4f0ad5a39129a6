mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{
    ClientMessage, MessageError, OutboundMessage, PresenceOrdering, ServerMessage,
    MESSAGE_FROM_CLIENT, MESSAGE_FROM_SERVER, UPDATED_CLIENTS,
};
