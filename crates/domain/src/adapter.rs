//! Adapter and service descriptions advertised at the directory service.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
    pub port: u16,
}

impl IpAddress {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdapterDescription {
    pub id: String,
    pub name: String,
    pub language: String,
    pub addresses: Vec<IpAddress>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl AdapterDescription {
    pub fn primary_address(&self) -> Option<&IpAddress> {
        self.addresses.first()
    }

    /// `other` has this adapter's id and lists this adapter's primary address.
    pub fn same_endpoint(&self, other: &AdapterDescription) -> bool {
        self.id == other.id
            && self
                .primary_address()
                .is_some_and(|primary| other.addresses.contains(primary))
    }

    /// Same adapter name at the same primary address, regardless of id.
    pub fn same_named_endpoint(&self, other: &AdapterDescription) -> bool {
        self.name == other.name && self.primary_address() == other.primary_address()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub id: String,
    pub name: String,
    pub language: String,
    pub addresses: Vec<IpAddress>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}
