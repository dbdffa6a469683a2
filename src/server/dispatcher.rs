use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::{Credentials, NewVm, VmId, VmStore, VmUpdate};
use crate::protocol::{Command, Request, Response, reason};
use crate::server::sessions::{ConnectionId, SessionStore};

/// Routes decoded requests to store operations and shapes the responses.
///
/// The dispatcher holds no per-connection state. The caller's identity is
/// passed with every request and its session is looked up in the shared
/// `SessionStore`.
///
/// Every failure is turned into a response here; nothing propagates to the
/// connection, so a bad request never closes the socket.
pub struct Dispatcher<S: VmStore> {
    store: Arc<S>,
    sessions: Arc<SessionStore>,
}

/// The `vm_id` field of an `auth` request.
#[derive(Debug, PartialEq, Eq)]
enum VmIdField {
    /// Absent, null, zero, or an empty string.
    Missing,
    Id(VmId),
    /// Present but not an identifier any VM can have.
    Invalid,
}

impl VmIdField {
    fn parse(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => VmIdField::Missing,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => VmIdField::Missing,
                Some(n) => VmId::try_from(n).map_or(VmIdField::Invalid, VmIdField::Id),
                None => VmIdField::Invalid,
            },
            Some(Value::String(s)) if s.is_empty() => VmIdField::Missing,
            Some(Value::String(s)) => s.trim().parse().map_or(VmIdField::Invalid, VmIdField::Id),
            Some(_) => VmIdField::Invalid,
        }
    }
}

impl<S: VmStore> Dispatcher<S> {
    pub fn new(store: Arc<S>, sessions: Arc<SessionStore>) -> Self {
        Self { store, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one request from connection `conn`.
    pub async fn dispatch(&self, conn: ConnectionId, request: Request) -> Response {
        let Request { command, data } = request;
        let session = self.sessions.get(conn);

        let Some(command) = command.as_deref().and_then(Command::from_name) else {
            info!(peer = %conn, command = ?command, "unrecognized command");
            return Response::error(reason::INVALID_COMMAND);
        };
        info!(peer = %conn, command = command.name(), vm_id = ?session, "dispatching");

        match command {
            Command::Auth => self.auth(conn, data.as_ref()).await,
            Command::Register => self.register(data).await,
            Command::ListVms => self.list_vms(None).await,
            Command::ListAuthorizedVms => {
                // Sessions of every connection, not only the caller's
                let ids = self.sessions.all_authenticated();
                self.list_vms(Some(&ids)).await
            }
            Command::Update => match session {
                Some(vm_id) => self.update(conn, vm_id, data.as_ref()).await,
                None => Response::error(reason::NOT_LOGGED_IN),
            },
            Command::ListDisks => self.list_disks().await,
            Command::Logout => self.logout(conn),
        }
    }

    async fn auth(&self, conn: ConnectionId, data: Option<&Value>) -> Response {
        let vm_id = VmIdField::parse(data.and_then(|d| d.get("vm_id")));
        let password = data
            .and_then(|d| d.get("password"))
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty());

        let (vm_id, password) = match (vm_id, password) {
            (VmIdField::Missing, _) | (_, None) => {
                return Response::error(reason::MISSING_CREDENTIALS);
            }
            (VmIdField::Invalid, Some(_)) => {
                info!(peer = %conn, "authentication failed: malformed vm_id");
                return Response::error(reason::INVALID_CREDENTIALS);
            }
            (VmIdField::Id(vm_id), Some(password)) => (vm_id, password),
        };

        match self.store.verify_password(vm_id, password).await {
            Ok(Credentials::Valid) => {
                let previous = self.sessions.set(conn, vm_id);
                info!(peer = %conn, vm_id, previous = ?previous, "vm authenticated");
                Response::Ok
            }
            Ok(outcome) => {
                info!(peer = %conn, vm_id, outcome = ?outcome, "authentication failed");
                Response::error(reason::INVALID_CREDENTIALS)
            }
            Err(e) => {
                error!(peer = %conn, vm_id, error = %e, "password check failed");
                Response::error(reason::INTERNAL_ERROR)
            }
        }
    }

    async fn register(&self, data: Option<Value>) -> Response {
        let vm = match NewVm::from_json(data.unwrap_or(Value::Null)) {
            Ok(vm) => vm,
            Err(e) => {
                info!(error = %e, "rejected registration");
                return Response::error_with_detail(reason::INVALID_VM_DATA, e);
            }
        };

        match self.store.create_vm(&vm).await {
            Ok(vm_id) => {
                info!(vm_id, disks = vm.disks.len(), "vm registered");
                Response::Registered(vm_id)
            }
            Err(e) => {
                error!(error = %e, "failed to register vm");
                Response::error(reason::REGISTER_FAILED)
            }
        }
    }

    async fn list_vms(&self, ids: Option<&[VmId]>) -> Response {
        match self.store.list_vms(ids).await {
            Ok(vms) => Response::Vms(vms),
            Err(e) => {
                error!(error = %e, "failed to list vms");
                Response::error(reason::INTERNAL_ERROR)
            }
        }
    }

    async fn update(&self, conn: ConnectionId, vm_id: VmId, data: Option<&Value>) -> Response {
        let update = match VmUpdate::from_json(data.unwrap_or(&Value::Null)) {
            Ok(update) => update,
            Err(e) => {
                info!(peer = %conn, vm_id, error = %e, "rejected update");
                return Response::error_with_detail(reason::INVALID_UPDATE, e);
            }
        };

        match self.store.update_vm(vm_id, &update).await {
            Ok(true) => {
                info!(peer = %conn, vm_id, "vm updated");
                Response::Ok
            }
            Ok(false) => {
                warn!(peer = %conn, vm_id, "session vm no longer exists");
                Response::NotApplied
            }
            Err(e) => {
                error!(peer = %conn, vm_id, error = %e, "failed to update vm");
                Response::error(reason::UPDATE_FAILED)
            }
        }
    }

    async fn list_disks(&self) -> Response {
        match self.store.list_disks().await {
            Ok(disks) => Response::Disks(disks),
            Err(e) => {
                error!(error = %e, "failed to list disks");
                Response::error(reason::INTERNAL_ERROR)
            }
        }
    }

    fn logout(&self, conn: ConnectionId) -> Response {
        match self.sessions.remove(conn) {
            Some(vm_id) => {
                info!(peer = %conn, vm_id, "vm logged out");
                Response::Ok
            }
            None => Response::error(reason::NOT_LOGGED_IN),
        }
    }
}
