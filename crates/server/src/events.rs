use serfnet::ServerEvent;

pub fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClientConnected { player_index, addr } => {
            log::info!("Player {} connected from {}", player_index, addr);
        }
        ServerEvent::ClientDisconnected {
            player_index,
            reason,
        } => {
            log::info!("Player {} {}", player_index, reason.as_str());
        }
        ServerEvent::ClientStarted { player_index } => {
            log::info!("Player {} is in game", player_index);
        }
        ServerEvent::UserAction {
            player_index,
            number,
            payload,
        } => {
            log::debug!(
                "Player {} action {} ({} bytes)",
                player_index,
                number,
                payload.len()
            );
        }
        ServerEvent::ConnectionDenied { addr, reason } => {
            log::warn!("Connection denied to {}: {}", addr, reason);
        }
    }
}
