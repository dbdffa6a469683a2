use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::db::VmId;

/// Identity of a connection: the peer's transport address.
pub type ConnectionId = SocketAddr;

/// Sessions of all live connections.
///
/// Maps each authenticated connection to the VM identifier it authenticated
/// as. Entries are added by `auth`, and removed by `logout` or when the
/// connection closes. Nothing is persisted; the store starts empty with
/// every process.
///
/// Each operation takes the lock once, so `set`, `get` and `remove` are
/// atomic with respect to each other. The lock is never held across an
/// await.
#[derive(Debug, Default)]
pub struct SessionStore {
    // connection -> authenticated VM
    sessions: Mutex<HashMap<ConnectionId, VmId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with a VM, replacing any previous association.
    /// Returns the previous VM identifier, if any.
    pub fn set(&self, conn: ConnectionId, vm_id: VmId) -> Option<VmId> {
        self.sessions.lock().insert(conn, vm_id)
    }

    pub fn get(&self, conn: ConnectionId) -> Option<VmId> {
        self.sessions.lock().get(&conn).copied()
    }

    /// Removes the session of a connection. Returns the VM it was
    /// authenticated as, or `None` if it had no session.
    pub fn remove(&self, conn: ConnectionId) -> Option<VmId> {
        self.sessions.lock().remove(&conn)
    }

    /// VM identifiers authenticated on any connection, sorted and without
    /// duplicates.
    pub fn all_authenticated(&self) -> Vec<VmId> {
        let mut ids: Vec<VmId> = self.sessions.lock().values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of authenticated connections.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> ConnectionId {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_set_get_remove() {
        let store = SessionStore::new();
        assert_eq!(store.get(peer(1)), None);

        assert_eq!(store.set(peer(1), 10), None);
        assert_eq!(store.get(peer(1)), Some(10));
        assert_eq!(store.get(peer(2)), None);

        assert_eq!(store.remove(peer(1)), Some(10));
        assert_eq!(store.remove(peer(1)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reauth_overwrites() {
        let store = SessionStore::new();
        store.set(peer(1), 10);
        assert_eq!(store.set(peer(1), 11), Some(10));
        assert_eq!(store.get(peer(1)), Some(11));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_all_authenticated() {
        let store = SessionStore::new();
        assert!(store.all_authenticated().is_empty());

        store.set(peer(1), 30);
        store.set(peer(2), 10);
        store.set(peer(3), 30);
        assert_eq!(store.all_authenticated(), vec![10, 30]);

        store.remove(peer(2));
        assert_eq!(store.all_authenticated(), vec![30]);
    }
}
