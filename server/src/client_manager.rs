//! Client session management for the dungeon server
//!
//! This module tracks every connected UDP client:
//! - Session lifecycle (connect, disconnect, timeout)
//! - Display names chosen at connect time
//! - Input sequencing, so late or duplicated input packets are dropped
//! - Capacity limits and address lookup for routing replies
//!
//! Room membership is not tracked here; see the room registry.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a client may stay silent before it is dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client session
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Sanitized display name
    pub name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest input sequence number accepted so far
    pub last_input_sequence: Option<u32>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            last_seen: Instant::now(),
            last_input_sequence: None,
        }
    }

    /// Accepts `sequence` if it is newer than every sequence seen before.
    ///
    /// Input is most-recent-wins, so an older packet that arrives late would
    /// overwrite newer state and is rejected instead.
    pub fn accept_input(&mut self, sequence: u32) -> bool {
        self.last_seen = Instant::now();
        match self.last_input_sequence {
            Some(last) if sequence <= last => false,
            _ => {
                self.last_input_sequence = Some(sequence);
                true
            }
        }
    }

    /// Returns true if nothing has been received within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Owns all client sessions and enforces the server's capacity.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty manager. Client IDs start from 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    /// `name` is stored as given; callers sanitize it with the assigned id.
    pub fn add_client(&mut self, addr: SocketAddr, name: String) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr, name);
        info!(
            "Client {} ({}) connected from {}",
            client_id, client.name, addr
        );
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by network address.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn set_name(&mut self, client_id: u32, name: String) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.name = name;
        }
    }

    /// Refreshes a client's activity timestamp.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Returns false for unknown clients and stale sequence numbers.
    pub fn accept_input(&mut self, client_id: u32, sequence: u32) -> bool {
        self.clients
            .get_mut(&client_id)
            .map(|client| client.accept_input(sequence))
            .unwrap_or(false)
    }

    pub fn name_of(&self, client_id: u32) -> Option<&str> {
        self.clients.get(&client_id).map(|c| c.name.as_str())
    }

    pub fn get_client_addr(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so their rooms can be cleaned up.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, "ada".to_string());

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.name, "ada");
        assert_eq!(client.last_input_sequence, None);
    }

    #[test]
    fn test_client_rejects_stale_input() {
        let mut client = Client::new(1, test_addr(), "ada".to_string());

        assert!(client.accept_input(0));
        assert!(client.accept_input(5));
        assert!(!client.accept_input(5));
        assert!(!client.accept_input(3));
        assert!(client.accept_input(6));
        assert_eq!(client.last_input_sequence, Some(6));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), "ada".to_string());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let client_id1 = manager.add_client(test_addr(), "a".to_string()).unwrap();
        let client_id2 = manager.add_client(test_addr2(), "b".to_string()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.name_of(client_id2), Some("b"));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), "a".to_string()).is_some());
        assert!(manager.add_client(test_addr2(), "b".to_string()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), "a".to_string()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr(), "a".to_string()).unwrap();
        let _client_id2 = manager.add_client(test_addr2(), "b".to_string()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
        assert_eq!(manager.get_client_addr(client_id1), Some(test_addr()));
    }

    #[test]
    fn test_accept_input_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.accept_input(999, 1));
    }

    #[test]
    fn test_set_name() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr(), String::new()).unwrap();

        manager.set_name(id, "Player 1".to_string());
        assert_eq!(manager.name_of(id), Some("Player 1"));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(3);
        let quiet = manager.add_client(test_addr(), "q".to_string()).unwrap();
        let active = manager.add_client(test_addr2(), "a".to_string()).unwrap();

        if let Some(client) = manager.clients.get_mut(&quiet) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }
        manager.touch(active);

        assert_eq!(manager.check_timeouts(), vec![quiet]);
        assert_eq!(manager.len(), 1);
        assert!(manager.get_client_addr(active).is_some());
    }
}
