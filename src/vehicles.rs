//! Vehicle registry keyed by plate string
//!
//! Answers "who owns this plate" for detected plates and backs the lookup,
//! save and search endpoints. Data lives in memory for the life of the
//! server.

use crate::error::PlateError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Owner and vehicle metadata for one plate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub owner_name: String,
    pub purchase_year: Option<i32>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
    pub insurance_valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Registry key for a plate: trimmed and uppercased
pub fn plate_key(plate: &str) -> String {
    plate.trim().to_uppercase()
}

#[derive(Debug, Default)]
pub struct VehicleRegistry {
    vehicles: RwLock<BTreeMap<String, Vehicle>>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with a few demo vehicles
    pub fn with_sample_data() -> Self {
        let registry = Self::new();
        for vehicle in sample_vehicles() {
            // Sample records always carry plate and owner
            let _ = registry.upsert(vehicle);
        }
        registry
    }

    /// Insert or replace a vehicle. Returns true when the plate was new.
    pub fn upsert(&self, mut vehicle: Vehicle) -> Result<bool, PlateError> {
        vehicle.plate = plate_key(&vehicle.plate);
        vehicle.owner_name = vehicle.owner_name.trim().to_string();
        if vehicle.plate.is_empty() || vehicle.owner_name.is_empty() {
            return Err(PlateError::InvalidRequest(
                "Plate number and owner name are required".to_string(),
            ));
        }

        let mut vehicles = self.vehicles.write().unwrap_or_else(PoisonError::into_inner);
        let created = vehicles.insert(vehicle.plate.clone(), vehicle).is_none();
        Ok(created)
    }

    pub fn lookup(&self, plate: &str) -> Option<Vehicle> {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&plate_key(plate))
            .cloned()
    }

    /// Case-insensitive substring match on plate, owner or model, ordered
    /// by plate
    pub fn search(&self, term: &str) -> Vec<Vehicle> {
        let needle = term.trim().to_lowercase();
        let matches = |field: &str| field.to_lowercase().contains(&needle);

        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|v| {
                matches(&v.plate)
                    || matches(&v.owner_name)
                    || v.model.as_deref().is_some_and(|m| matches(m))
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vehicles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// plate, owner, year, model, colour, type, insurance valid until, notes
const SAMPLE_VEHICLES: [(&str, &str, i32, &str, &str, &str, &str, &str); 3] = [
    ("TN09AB1234", "Ravi Shankar Kumar", 2020, "Maruti Swift", "White", "Car", "2024-12-31", "Personal vehicle"),
    ("MH01CD5678", "Priya Sharma", 2019, "Honda City", "Silver", "Car", "2024-06-30", "Company car"),
    ("DL02EF9012", "Amit Patel", 2021, "Hyundai Creta", "Black", "SUV", "2024-09-15", "Family vehicle"),
];

fn sample_vehicles() -> Vec<Vehicle> {
    SAMPLE_VEHICLES
        .iter()
        .map(|&(plate, owner, year, model, color, kind, insured, notes)| Vehicle {
            plate: plate.to_string(),
            owner_name: owner.to_string(),
            purchase_year: Some(year),
            model: Some(model.to_string()),
            color: Some(color.to_string()),
            vehicle_type: Some(kind.to_string()),
            insurance_valid_until: insured.parse().ok(),
            notes: Some(notes.to_string()),
        })
        .collect()
}
