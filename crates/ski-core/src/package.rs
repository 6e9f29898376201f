//! # Trip Packages
//!
//! Bookable ski-trip packages, loaded from `config/packages.toml`.
//! Each package carries its own balance due date for installment plans.

use crate::money::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bookable trip package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Unique package identifier (e.g., "val-thorens-week")
    pub id: String,

    /// Display name
    pub name: String,

    /// Per-person price
    pub price: Money,

    /// Date range label shown to customers (e.g., "12-19 Jan 2027")
    pub dates: String,

    /// Date the installment balance is collected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_due_date: Option<NaiveDate>,

    /// Whether this package is open for booking
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Package {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        dates: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            dates: dates.into(),
            balance_due_date: None,
            active: true,
        }
    }

    /// Builder: set balance due date
    pub fn with_balance_due_date(mut self, date: NaiveDate) -> Self {
        self.balance_due_date = Some(date);
        self
    }
}

/// Package catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageCatalog {
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl PackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, package: Package) {
        self.packages.push(package);
    }

    /// Builder: add a package
    pub fn with_package(mut self, package: Package) -> Self {
        self.add(package);
        self
    }

    /// Find an active package by ID
    pub fn get(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id && p.active)
    }

    pub fn active_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.active)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
