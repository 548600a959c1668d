//! Maps raw client events onto state-machine triggers.

use pairline_client::{ClientError, ClientEvent, PairingEncoder};

use crate::record::Trigger;

/// Convert a client event into a trigger, encoding pairing codes for display.
pub async fn to_trigger(
    event: ClientEvent,
    encoder: &dyn PairingEncoder,
) -> Result<Trigger, ClientError> {
    Ok(match event {
        ClientEvent::PairingCode(code) => Trigger::PairingCode(encoder.encode(&code).await?),
        ClientEvent::Authenticated => Trigger::Authenticated,
        ClientEvent::Ready => Trigger::Ready,
        ClientEvent::AuthFailure(message) => Trigger::AuthFailure(message),
        ClientEvent::Disconnected(reason) => Trigger::Disconnected(reason),
    })
}
