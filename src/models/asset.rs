//! IT inventory: equipment, software licences and contracts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[default]
    Computer,
    Software,
    Contract,
    NetworkDevice,
    Server,
    Printer,
    MobileDevice,
    Peripheral,
    Other,
}

impl AssetType {
    pub const ALL: [AssetType; 9] = [
        AssetType::Computer,
        AssetType::Software,
        AssetType::Contract,
        AssetType::NetworkDevice,
        AssetType::Server,
        AssetType::Printer,
        AssetType::MobileDevice,
        AssetType::Peripheral,
        AssetType::Other,
    ];

    /// Wire and column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Computer => "computer",
            AssetType::Software => "software",
            AssetType::Contract => "contract",
            AssetType::NetworkDevice => "network_device",
            AssetType::Server => "server",
            AssetType::Printer => "printer",
            AssetType::MobileDevice => "mobile_device",
            AssetType::Peripheral => "peripheral",
            AssetType::Other => "other",
        }
    }

    /// Display label shown to staff.
    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Computer => "Computadora",
            AssetType::Software => "Software",
            AssetType::Contract => "Contrato",
            AssetType::NetworkDevice => "Dispositivo de Red",
            AssetType::Server => "Servidor",
            AssetType::Printer => "Impresora",
            AssetType::MobileDevice => "Dispositivo Móvil",
            AssetType::Peripheral => "Periférico",
            AssetType::Other => "Otro",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("\"{}\" is not a valid choice.", s))
    }
}

pub const ASSET_TYPE_CHOICES: &[&str] = &[
    "computer",
    "software",
    "contract",
    "network_device",
    "server",
    "printer",
    "mobile_device",
    "peripheral",
    "other",
];

pub const DEFAULT_ASSET_STATUS: &str = "Activo";

fn default_status() -> String {
    DEFAULT_ASSET_STATUS.to_string()
}

fn default_true() -> bool {
    true
}

/// Writable asset columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssetFields {
    pub name: String,
    pub asset_id: String,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_true")]
    pub connectivity: bool,
    #[serde(default = "default_true")]
    pub antivirus_enabled: bool,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub warranty_expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl AssetFields {
    /// Minimal record with column defaults applied.
    pub fn new(name: impl Into<String>, asset_id: impl Into<String>) -> Self {
        AssetFields {
            name: name.into(),
            asset_id: asset_id.into(),
            asset_type: AssetType::default(),
            description: None,
            status: default_status(),
            connectivity: true,
            antivirus_enabled: true,
            purchase_date: None,
            warranty_expiry_date: None,
            contract_number: None,
            location: None,
            ip_address: None,
            mac_address: None,
            assigned_to: None,
        }
    }

    /// Values the free-text search runs over.
    pub fn searchable(&self) -> [Option<&str>; 7] {
        [
            Some(self.name.as_str()),
            Some(self.asset_id.as_str()),
            Some(self.asset_type.as_str()),
            self.location.as_deref(),
            self.assigned_to.as_deref(),
            Some(self.status.as_str()),
            self.description.as_deref(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: i64,
    #[serde(flatten)]
    pub fields: AssetFields,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fields.name, self.fields.asset_id)
    }
}
