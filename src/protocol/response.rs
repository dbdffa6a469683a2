use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::db::{DiskListing, VmId, VmRecord};

/// Error strings sent to clients.
///
/// Database error text never appears in a response; persistence faults are
/// reported with one of the generic strings below.
pub mod reason {
    pub const INVALID_COMMAND: &str = "Invalid command";
    pub const MISSING_CREDENTIALS: &str = "Missing credentials";
    /// Wrong password and unknown VM identifier alike.
    pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
    pub const NOT_LOGGED_IN: &str = "You have not been logged in";
    pub const INVALID_VM_DATA: &str = "Invalid VM data";
    pub const REGISTER_FAILED: &str = "Failed to register VM";
    pub const INVALID_UPDATE: &str = "Invalid update";
    pub const UPDATE_FAILED: &str = "Failed to update VM";
    pub const INTERNAL_ERROR: &str = "Internal server error";
}

/// A response frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `{"success": true}`
    Ok,
    /// `{"success": true, "vm_id": <id>}`
    Registered(VmId),
    /// `{"success": false}`
    NotApplied,
    /// `{"error": <message>}`
    Error(String),
    /// `{"vms": [...]}`
    Vms(Vec<VmRecord>),
    /// `{"disks": [...]}`
    Disks(Vec<DiskListing>),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    /// An error with a fixed reason and a client-safe detail.
    pub fn error_with_detail(reason: &str, detail: impl std::fmt::Display) -> Self {
        Response::Error(format!("{}: {}", reason, detail))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Response::Ok => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("success", &true)?;
                map.end()
            }
            Response::Registered(vm_id) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("vm_id", vm_id)?;
                map.end()
            }
            Response::NotApplied => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("success", &false)?;
                map.end()
            }
            Response::Error(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
            Response::Vms(vms) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("vms", vms)?;
                map.end()
            }
            Response::Disks(disks) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("disks", disks)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DiskRecord;
    use serde_json::json;

    fn to_value(response: &Response) -> serde_json::Value {
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_envelope_shapes() {
        assert_eq!(to_value(&Response::Ok), json!({"success": true}));
        assert_eq!(
            to_value(&Response::Registered(7)),
            json!({"success": true, "vm_id": 7})
        );
        assert_eq!(to_value(&Response::NotApplied), json!({"success": false}));
        assert_eq!(
            to_value(&Response::error(reason::NOT_LOGGED_IN)),
            json!({"error": "You have not been logged in"})
        );
    }

    #[test]
    fn test_listing_shapes() {
        let vms = vec![VmRecord {
            id: 1,
            ram: 8,
            cpu: 2,
            disks: vec![DiskRecord {
                id: 3,
                size: 10,
                vm_id: 1,
            }],
        }];
        assert_eq!(
            to_value(&Response::Vms(vms)),
            json!({"vms": [{"id": 1, "ram": 8, "cpu": 2, "disks": [{"id": 3, "size": 10, "vm_id": 1}]}]})
        );
        assert_eq!(to_value(&Response::Disks(vec![])), json!({"disks": []}));
    }

    #[test]
    fn test_error_with_detail() {
        let response = Response::error_with_detail(reason::INVALID_UPDATE, "no fields to update");
        assert_eq!(
            response,
            Response::Error("Invalid update: no fields to update".to_string())
        );
        assert!(response.is_error());
    }
}
