//! The connection hub.
//!
//! A single coordinator task owns the client map and the room map; every
//! membership change and every outbound send goes through its mailbox, so
//! delivery order within a room is exactly the order the hub accepted the
//! messages. Each client has a bounded outbound queue; when it fills, the
//! hub drops the client rather than let a slow consumer stall the room.

use felt_types::constants::CLIENT_SEND_QUEUE;
use felt_types::ServerFrame;
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

struct ClientEntry {
    sender: mpsc::Sender<ServerFrame>,
    player_id: Option<String>,
    room: Option<String>,
}

enum Command {
    Register {
        client_id: String,
        sender: mpsc::Sender<ServerFrame>,
    },
    Unregister {
        client_id: String,
    },
    BindPlayer {
        client_id: String,
        player_id: String,
    },
    JoinRoom {
        client_id: String,
        room_id: String,
    },
    LeaveRoom {
        client_id: String,
    },
    Unicast {
        client_id: String,
        frame: ServerFrame,
    },
    SendToPlayer {
        player_id: String,
        frame: ServerFrame,
    },
    RoomCast {
        room_id: String,
        frame: ServerFrame,
    },
    Broadcast {
        frame: ServerFrame,
    },
    CloseRoom {
        room_id: String,
        farewell: Option<ServerFrame>,
    },
    ClientCount {
        resp: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the hub coordinator.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
}

impl Hub {
    /// Spawn the coordinator task and return its handle.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(1_024);
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Create a bounded outbound queue and register the client under it.
    /// The receiver side is drained by the client's writer loop.
    pub async fn register(&self, client_id: &str) -> mpsc::Receiver<ServerFrame> {
        let (sender, receiver) = mpsc::channel(CLIENT_SEND_QUEUE);
        self.send(Command::Register {
            client_id: client_id.to_string(),
            sender,
        })
        .await;
        receiver
    }

    pub async fn unregister(&self, client_id: &str) {
        self.send(Command::Unregister {
            client_id: client_id.to_string(),
        })
        .await;
    }

    /// Associate an authenticated player id with a connection. Re-binding
    /// (reconnection) moves the player to the new connection.
    pub async fn bind_player(&self, client_id: &str, player_id: &str) {
        self.send(Command::BindPlayer {
            client_id: client_id.to_string(),
            player_id: player_id.to_string(),
        })
        .await;
    }

    /// Join a table room, leaving any previous one; a client is in at most
    /// one table room at a time.
    pub async fn join_room(&self, client_id: &str, room_id: &str) {
        self.send(Command::JoinRoom {
            client_id: client_id.to_string(),
            room_id: room_id.to_string(),
        })
        .await;
    }

    pub async fn leave_room(&self, client_id: &str) {
        self.send(Command::LeaveRoom {
            client_id: client_id.to_string(),
        })
        .await;
    }

    pub async fn unicast(&self, client_id: &str, frame: ServerFrame) {
        self.send(Command::Unicast {
            client_id: client_id.to_string(),
            frame,
        })
        .await;
    }

    /// Deliver to a player wherever they are connected; silently dropped for
    /// players with no live connection (bots, disconnected seats).
    pub async fn send_to_player(&self, player_id: &str, frame: ServerFrame) {
        self.send(Command::SendToPlayer {
            player_id: player_id.to_string(),
            frame,
        })
        .await;
    }

    pub async fn room_cast(&self, room_id: &str, frame: ServerFrame) {
        self.send(Command::RoomCast {
            room_id: room_id.to_string(),
            frame,
        })
        .await;
    }

    /// Deliver to every connected client regardless of room membership.
    pub async fn broadcast(&self, frame: ServerFrame) {
        self.send(Command::Broadcast { frame }).await;
    }

    /// Evict every member of a room, optionally delivering a last frame.
    pub async fn close_room(&self, room_id: &str, farewell: Option<ServerFrame>) {
        self.send(Command::CloseRoom {
            room_id: room_id.to_string(),
            farewell,
        })
        .await;
    }

    pub async fn client_count(&self) -> usize {
        let (resp, rx) = oneshot::channel();
        self.send(Command::ClientCount { resp }).await;
        rx.await.unwrap_or(0)
    }

    async fn send(&self, command: Command) {
        if self.tx.send(command).await.is_err() {
            warn!("hub coordinator is gone; dropping command");
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut clients: HashMap<String, ClientEntry> = HashMap::new();
    let mut rooms: HashMap<String, HashSet<String>> = HashMap::new();
    let mut players: HashMap<String, String> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register { client_id, sender } => {
                debug!(client = %client_id, "client registered");
                clients.insert(
                    client_id,
                    ClientEntry {
                        sender,
                        player_id: None,
                        room: None,
                    },
                );
            }
            Command::Unregister { client_id } => {
                remove_client(&mut clients, &mut rooms, &mut players, &client_id);
            }
            Command::BindPlayer {
                client_id,
                player_id,
            } => {
                // Latest connection wins; a stale connection for the same
                // player loses its binding.
                if let Some(previous) = players.insert(player_id.clone(), client_id.clone()) {
                    if previous != client_id {
                        if let Some(entry) = clients.get_mut(&previous) {
                            entry.player_id = None;
                        }
                    }
                }
                if let Some(entry) = clients.get_mut(&client_id) {
                    entry.player_id = Some(player_id);
                }
            }
            Command::JoinRoom { client_id, room_id } => {
                let Some(entry) = clients.get_mut(&client_id) else {
                    continue;
                };
                if let Some(previous) = entry.room.take() {
                    if let Some(members) = rooms.get_mut(&previous) {
                        members.remove(&client_id);
                    }
                }
                entry.room = Some(room_id.clone());
                rooms.entry(room_id).or_default().insert(client_id);
            }
            Command::LeaveRoom { client_id } => {
                if let Some(entry) = clients.get_mut(&client_id) {
                    if let Some(room) = entry.room.take() {
                        if let Some(members) = rooms.get_mut(&room) {
                            members.remove(&client_id);
                            if members.is_empty() {
                                rooms.remove(&room);
                            }
                        }
                    }
                }
            }
            Command::Unicast { client_id, frame } => {
                deliver(&mut clients, &mut rooms, &mut players, &client_id, &frame);
            }
            Command::SendToPlayer { player_id, frame } => {
                if let Some(client_id) = players.get(&player_id).cloned() {
                    deliver(&mut clients, &mut rooms, &mut players, &client_id, &frame);
                }
            }
            Command::RoomCast { room_id, frame } => {
                let members: Vec<String> = rooms
                    .get(&room_id)
                    .map(|m| m.iter().cloned().collect())
                    .unwrap_or_default();
                for client_id in members {
                    deliver(&mut clients, &mut rooms, &mut players, &client_id, &frame);
                }
            }
            Command::Broadcast { frame } => {
                let ids: Vec<String> = clients.keys().cloned().collect();
                for client_id in ids {
                    deliver(&mut clients, &mut rooms, &mut players, &client_id, &frame);
                }
            }
            Command::CloseRoom { room_id, farewell } => {
                let members: Vec<String> = rooms
                    .remove(&room_id)
                    .map(|m| m.into_iter().collect())
                    .unwrap_or_default();
                for client_id in members {
                    if let Some(frame) = &farewell {
                        deliver(&mut clients, &mut rooms, &mut players, &client_id, frame);
                    }
                    if let Some(entry) = clients.get_mut(&client_id) {
                        entry.room = None;
                    }
                }
            }
            Command::ClientCount { resp } => {
                let _ = resp.send(clients.len());
            }
        }
    }
}

/// Try to enqueue a frame; a full queue means the consumer is too slow and
/// the connection is dropped on the spot.
fn deliver(
    clients: &mut HashMap<String, ClientEntry>,
    rooms: &mut HashMap<String, HashSet<String>>,
    players: &mut HashMap<String, String>,
    client_id: &str,
    frame: &ServerFrame,
) {
    let Some(entry) = clients.get(client_id) else {
        return;
    };
    match entry.sender.try_send(frame.clone()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            info!(client = %client_id, "send queue full; disconnecting slow consumer");
            remove_client(clients, rooms, players, client_id);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            remove_client(clients, rooms, players, client_id);
        }
    }
}

fn remove_client(
    clients: &mut HashMap<String, ClientEntry>,
    rooms: &mut HashMap<String, HashSet<String>>,
    players: &mut HashMap<String, String>,
    client_id: &str,
) {
    let Some(entry) = clients.remove(client_id) else {
        return;
    };
    if let Some(room) = entry.room {
        if let Some(members) = rooms.get_mut(&room) {
            members.remove(client_id);
            if members.is_empty() {
                rooms.remove(&room);
            }
        }
    }
    if let Some(player_id) = entry.player_id {
        if players.get(&player_id).map(String::as_str) == Some(client_id) {
            players.remove(&player_id);
        }
    }
    debug!(client = %client_id, "client removed");
}
