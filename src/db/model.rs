//! Record types exchanged with the persistence layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::ValidationError;

/// Server-assigned identifier of a virtual machine record.
pub type VmId = i32;

/// A virtual machine with its disks, as returned by listings.
///
/// The password hash is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub id: VmId,
    pub ram: i32,
    pub cpu: i32,
    #[serde(default)]
    pub disks: Vec<DiskRecord>,
}

/// A disk row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRecord {
    pub id: i32,
    pub size: i32,
    pub vm_id: VmId,
}

/// A disk joined with the capacity fields of its owning VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskListing {
    pub id: i32,
    pub size: i32,
    pub vm_id: VmId,
    pub ram: i32,
    pub cpu: i32,
}

/// Body of a `register` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewVm {
    pub ram: i32,
    pub cpu: i32,
    pub password: String,
    #[serde(default)]
    pub disks: Vec<NewDisk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewDisk {
    pub size: i32,
}

impl NewVm {
    /// Decodes and validates a `register` request body.
    pub fn from_json(data: Value) -> Result<Self, ValidationError> {
        let vm: NewVm = serde_json::from_value(data)?;
        vm.validate()?;
        Ok(vm)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ram <= 0 {
            return Err(ValidationError::NotPositive("ram"));
        }
        if self.cpu <= 0 {
            return Err(ValidationError::NotPositive("cpu"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Empty("password"));
        }
        if self.disks.iter().any(|d| d.size <= 0) {
            return Err(ValidationError::NotPositive("size"));
        }
        Ok(())
    }
}

/// A partial update of a VM row.
///
/// Only `ram`, `cpu` and `password` can be changed. Fields left as `None`
/// keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmUpdate {
    pub ram: Option<i32>,
    pub cpu: Option<i32>,
    pub password: Option<String>,
}

impl VmUpdate {
    /// Builds an update from an `update` request body.
    ///
    /// Keys outside the allow-list are rejected before any query is built.
    pub fn from_json(data: &Value) -> Result<Self, ValidationError> {
        let Some(fields) = data.as_object() else {
            return Err(ValidationError::Malformed(
                "update data must be an object".to_string(),
            ));
        };

        let mut update = VmUpdate::default();
        for (key, value) in fields {
            match key.as_str() {
                "ram" => update.ram = Some(positive_int(value, "ram")?),
                "cpu" => update.cpu = Some(positive_int(value, "cpu")?),
                "password" => {
                    let password = value.as_str().ok_or_else(|| {
                        ValidationError::Malformed("field 'password' must be a string".to_string())
                    })?;
                    if password.is_empty() {
                        return Err(ValidationError::Empty("password"));
                    }
                    update.password = Some(password.to_string());
                }
                other => return Err(ValidationError::UnknownField(other.to_string())),
            }
        }

        if update.is_empty() {
            return Err(ValidationError::NothingToUpdate);
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.ram.is_none() && self.cpu.is_none() && self.password.is_none()
    }
}

fn positive_int(value: &Value, field: &'static str) -> Result<i32, ValidationError> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or(ValidationError::NotPositive(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_vm_defaults_disks() {
        let vm = NewVm::from_json(json!({"ram": 8, "cpu": 2, "password": "pw"})).unwrap();
        assert!(vm.disks.is_empty());
    }

    #[test]
    fn test_new_vm_rejects_wrong_types() {
        let err = NewVm::from_json(json!({"ram": "eight", "cpu": 2, "password": "pw"}));
        assert!(matches!(err, Err(ValidationError::Malformed(_))));

        let err = NewVm::from_json(json!({"ram": 8, "cpu": 2, "password": "pw", "disks": [{}]}));
        assert!(matches!(err, Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn test_new_vm_rejects_non_positive_values() {
        let err = NewVm::from_json(json!({"ram": 0, "cpu": 2, "password": "pw"}));
        assert_eq!(err, Err(ValidationError::NotPositive("ram")));

        let err = NewVm::from_json(json!({
            "ram": 8, "cpu": 2, "password": "pw", "disks": [{"size": 10}, {"size": -1}]
        }));
        assert_eq!(err, Err(ValidationError::NotPositive("size")));
    }

    #[test]
    fn test_new_vm_rejects_empty_password() {
        let err = NewVm::from_json(json!({"ram": 8, "cpu": 2, "password": ""}));
        assert_eq!(err, Err(ValidationError::Empty("password")));
    }

    #[test]
    fn test_update_allow_list() {
        let update = VmUpdate::from_json(&json!({"ram": 16})).unwrap();
        assert_eq!(
            update,
            VmUpdate {
                ram: Some(16),
                ..Default::default()
            }
        );

        let err = VmUpdate::from_json(&json!({"ram": 16, "id = 1; --": 3}));
        assert_eq!(
            err,
            Err(ValidationError::UnknownField("id = 1; --".to_string()))
        );
    }

    #[test]
    fn test_update_rejects_empty_and_non_object() {
        assert_eq!(
            VmUpdate::from_json(&json!({})),
            Err(ValidationError::NothingToUpdate)
        );
        assert!(matches!(
            VmUpdate::from_json(&json!([1, 2])),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_update_field_types() {
        assert_eq!(
            VmUpdate::from_json(&json!({"cpu": 2.5})),
            Err(ValidationError::NotPositive("cpu"))
        );
        assert_eq!(
            VmUpdate::from_json(&json!({"password": ""})),
            Err(ValidationError::Empty("password"))
        );
        assert!(matches!(
            VmUpdate::from_json(&json!({"password": 42})),
            Err(ValidationError::Malformed(_))
        ));
    }
}
