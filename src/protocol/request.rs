use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A decoded request frame.
///
/// `command` is kept as a raw string so that unknown commands reach the
/// dispatcher and get an error response instead of closing the connection.
/// A `command` that is not a string decodes as `None` for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, deserialize_with = "command_name")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Request {
    pub fn new(command: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            command: Some(command.into()),
            data,
        }
    }
}

fn command_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(name)) => Ok(Some(name)),
        _ => Ok(None),
    }
}

/// Commands understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Auth,
    Register,
    ListVms,
    ListAuthorizedVms,
    Update,
    ListDisks,
    Logout,
}

impl Command {
    /// Looks up a command by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auth" => Some(Command::Auth),
            "register" => Some(Command::Register),
            "list_vms" => Some(Command::ListVms),
            "list_authorized_vms" => Some(Command::ListAuthorizedVms),
            "update" => Some(Command::Update),
            "list_disks" => Some(Command::ListDisks),
            "logout" => Some(Command::Logout),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Auth => "auth",
            Command::Register => "register",
            Command::ListVms => "list_vms",
            Command::ListAuthorizedVms => "list_authorized_vms",
            Command::Update => "update",
            Command::ListDisks => "list_disks",
            Command::Logout => "logout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        for command in [
            Command::Auth,
            Command::Register,
            Command::ListVms,
            Command::ListAuthorizedVms,
            Command::Update,
            Command::ListDisks,
            Command::Logout,
        ] {
            assert_eq!(Command::from_name(command.name()), Some(command));
        }
        assert_eq!(Command::from_name("LIST_VMS"), None);
        assert_eq!(Command::from_name(""), None);
    }

    #[test]
    fn test_request_optional_fields() {
        let request: Request = serde_json::from_str(r#"{"command":"list_vms"}"#).unwrap();
        assert_eq!(request.command.as_deref(), Some("list_vms"));
        assert!(request.data.is_none());

        let request: Request = serde_json::from_str("{}").unwrap();
        assert!(request.command.is_none());
    }

    #[test]
    fn test_request_non_string_command() {
        for text in [
            r#"{"command":5}"#,
            r#"{"command":null}"#,
            r#"{"command":["auth"],"data":{"vm_id":1}}"#,
            r#"{"command":{"name":"auth"}}"#,
        ] {
            let request: Request = serde_json::from_str(text).unwrap();
            assert!(request.command.is_none(), "{text}");
        }
    }
}
