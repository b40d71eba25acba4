use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

record_id!(
    /// License plate, the primary key of a vehicle.
    PlateId
);
record_id!(CustomerId);
record_id!(LocationId);
record_id!(RentalId);
record_id!(PaymentId);
record_id!(MaintenanceId);
record_id!(PartId);
record_id!(TechnicianId);
record_id!(SpecializationId);
record_id!(PenaltyId);
record_id!(DeploymentId);

/// Common shape of every persisted entity: a key plus a soft-delete flag.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Clone + Ord + fmt::Display + Send + Sync + 'static;

    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

/// Raised when a stored status label does not map onto a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Soft-delete flag carried by most tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RecordStatus::Active => "Active",
            RecordStatus::Inactive => "Inactive",
        }
    }

    pub const fn from_active(active: bool) -> Self {
        if active {
            RecordStatus::Active
        } else {
            RecordStatus::Inactive
        }
    }
}

impl FromStr for RecordStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Active" => Ok(RecordStatus::Active),
            "Inactive" => Ok(RecordStatus::Inactive),
            other => Err(UnknownStatus {
                kind: "record",
                value: other.to_string(),
            }),
        }
    }
}

/// Operational state of a vehicle. `Inactive` doubles as the soft-delete marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Available,
    #[serde(rename = "In Use")]
    InUse,
    Maintenance,
    Inactive,
}

impl VehicleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VehicleStatus::Available => "Available",
            VehicleStatus::InUse => "In Use",
            VehicleStatus::Maintenance => "Maintenance",
            VehicleStatus::Inactive => "Inactive",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Available" => Ok(VehicleStatus::Available),
            "In Use" => Ok(VehicleStatus::InUse),
            "Maintenance" => Ok(VehicleStatus::Maintenance),
            "Inactive" => Ok(VehicleStatus::Inactive),
            other => Err(UnknownStatus {
                kind: "vehicle",
                value: other.to_string(),
            }),
        }
    }
}

/// Settlement state of a penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyStatus {
    #[serde(rename = "UNPAID")]
    Unpaid,
    #[serde(rename = "PAID")]
    Paid,
}

impl PenaltyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PenaltyStatus::Unpaid => "UNPAID",
            PenaltyStatus::Paid => "PAID",
        }
    }
}

impl FromStr for PenaltyStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => Ok(PenaltyStatus::Unpaid),
            "PAID" => Ok(PenaltyStatus::Paid),
            _ => Err(UnknownStatus {
                kind: "penalty",
                value: value.to_string(),
            }),
        }
    }
}

/// Lifecycle of a branch deployment interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Active,
    Completed,
    Cancelled,
}

impl DeploymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DeploymentStatus::Active => "Active",
            DeploymentStatus::Completed => "Completed",
            DeploymentStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Active" => Ok(DeploymentStatus::Active),
            "Completed" => Ok(DeploymentStatus::Completed),
            "Cancelled" => Ok(DeploymentStatus::Cancelled),
            other => Err(UnknownStatus {
                kind: "deployment",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate_id: PlateId,
    pub vehicle_type: String,
    pub status: VehicleStatus,
    /// Daily rate used by the rental fee formula.
    pub rental_price: Decimal,
}

impl Vehicle {
    pub fn is_available(&self) -> bool {
        self.status == VehicleStatus::Available
    }
}

impl Record for Vehicle {
    type Id = PlateId;

    const ENTITY: &'static str = "vehicle";

    fn id(&self) -> PlateId {
        self.plate_id.clone()
    }

    fn is_active(&self) -> bool {
        self.status != VehicleStatus::Inactive
    }

    fn set_active(&mut self, active: bool) {
        if !active {
            self.status = VehicleStatus::Inactive;
        } else if self.status == VehicleStatus::Inactive {
            self.status = VehicleStatus::Available;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: LocationId,
    pub name: String,
    pub status: RecordStatus,
}

/// Lifecycle phase derived from a rental's timestamps and soft-delete flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalPhase {
    Booked,
    Active,
    Completed,
    Cancelled,
}

impl RentalPhase {
    pub const fn label(self) -> &'static str {
        match self {
            RentalPhase::Booked => "booked",
            RentalPhase::Active => "active",
            RentalPhase::Completed => "completed",
            RentalPhase::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalTransaction {
    pub rental_id: RentalId,
    pub customer_id: CustomerId,
    pub plate_id: PlateId,
    pub location_id: LocationId,
    pub pick_up_date_time: NaiveDateTime,
    /// `None` until the customer physically collects the vehicle.
    pub start_date_time: Option<NaiveDateTime>,
    /// `None` while the rental is ongoing.
    pub end_date_time: Option<NaiveDateTime>,
    pub status: RecordStatus,
}

impl RentalTransaction {
    pub fn phase(&self) -> RentalPhase {
        if self.status == RecordStatus::Inactive {
            RentalPhase::Cancelled
        } else if self.end_date_time.is_some() {
            RentalPhase::Completed
        } else if self.start_date_time.is_some() {
            RentalPhase::Active
        } else {
            RentalPhase::Booked
        }
    }

    pub fn is_picked_up(&self) -> bool {
        self.start_date_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub payment_id: PaymentId,
    pub rental_id: RentalId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub status: RecordStatus,
}

impl PaymentTransaction {
    /// The zero-amount row written at booking time and settled on completion.
    pub fn is_placeholder(&self) -> bool {
        self.amount.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTransaction {
    pub maintenance_id: MaintenanceId,
    pub plate_id: PlateId,
    /// Absent for vehicles flagged as defective before anyone is assigned.
    pub technician_id: Option<TechnicianId>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: Option<NaiveDateTime>,
    pub notes: String,
    pub hours_worked: Option<Decimal>,
    /// Cached `labor + parts`, refreshed after every line-item change.
    pub total_cost: Decimal,
    pub status: RecordStatus,
}

impl MaintenanceTransaction {
    pub fn is_in_progress(&self) -> bool {
        self.end_date_time.is_none()
    }
}

/// Composite key of a maintenance line item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineItemKey {
    pub maintenance_id: MaintenanceId,
    pub part_id: PartId,
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.maintenance_id, self.part_id)
    }
}

/// Parts consumed by a maintenance job (the "maintenance cheque").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceLineItem {
    pub maintenance_id: MaintenanceId,
    pub part_id: PartId,
    pub quantity_used: u32,
    pub status: RecordStatus,
}

impl MaintenanceLineItem {
    pub fn key(&self) -> LineItemKey {
        LineItemKey {
            maintenance_id: self.maintenance_id.clone(),
            part_id: self.part_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub part_id: PartId,
    pub part_name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub status: RecordStatus,
}

impl Part {
    pub fn has_stock(&self, requested: u32) -> bool {
        self.quantity >= requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub technician_id: TechnicianId,
    pub name: String,
    pub specialization_id: SpecializationId,
    /// Hourly labor rate.
    pub rate: Decimal,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyTransaction {
    pub penalty_id: PenaltyId,
    pub rental_id: RentalId,
    pub maintenance_id: MaintenanceId,
    pub total_penalty: Decimal,
    pub penalty_status: PenaltyStatus,
    pub date_issued: NaiveDate,
    pub status: RecordStatus,
}

impl PenaltyTransaction {
    pub fn is_paid(&self) -> bool {
        self.penalty_status == PenaltyStatus::Paid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTransaction {
    pub deployment_id: DeploymentId,
    pub plate_id: PlateId,
    pub location_id: LocationId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: DeploymentStatus,
}

impl DeploymentTransaction {
    pub fn is_current(&self) -> bool {
        self.end_date.is_none() && self.status == DeploymentStatus::Active
    }
}

macro_rules! status_flagged_record {
    ($record:ty, $id:ty, $entity:literal, $field:ident) => {
        impl Record for $record {
            type Id = $id;

            const ENTITY: &'static str = $entity;

            fn id(&self) -> $id {
                self.$field.clone()
            }

            fn is_active(&self) -> bool {
                self.status == RecordStatus::Active
            }

            fn set_active(&mut self, active: bool) {
                self.status = RecordStatus::from_active(active);
            }
        }
    };
}

status_flagged_record!(Customer, CustomerId, "customer", customer_id);
status_flagged_record!(Location, LocationId, "location", location_id);
status_flagged_record!(RentalTransaction, RentalId, "rental", rental_id);
status_flagged_record!(PaymentTransaction, PaymentId, "payment", payment_id);
status_flagged_record!(MaintenanceTransaction, MaintenanceId, "maintenance", maintenance_id);
status_flagged_record!(Part, PartId, "part", part_id);
status_flagged_record!(Technician, TechnicianId, "technician", technician_id);
status_flagged_record!(PenaltyTransaction, PenaltyId, "penalty", penalty_id);

impl Record for MaintenanceLineItem {
    type Id = LineItemKey;

    const ENTITY: &'static str = "maintenance line item";

    fn id(&self) -> LineItemKey {
        self.key()
    }

    fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    fn set_active(&mut self, active: bool) {
        self.status = RecordStatus::from_active(active);
    }
}

impl Record for DeploymentTransaction {
    type Id = DeploymentId;

    const ENTITY: &'static str = "deployment";

    fn id(&self) -> DeploymentId {
        self.deployment_id.clone()
    }

    fn is_active(&self) -> bool {
        self.status != DeploymentStatus::Cancelled
    }

    fn set_active(&mut self, active: bool) {
        if !active {
            self.status = DeploymentStatus::Cancelled;
        } else if self.status == DeploymentStatus::Cancelled {
            self.status = DeploymentStatus::Active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rental() -> RentalTransaction {
        let pick_up = NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|day| day.and_hms_opt(9, 0, 0))
            .expect("valid pick-up");
        RentalTransaction {
            rental_id: RentalId::from("RNT-0001"),
            customer_id: CustomerId::from("C-001"),
            plate_id: PlateId::from("ES-001"),
            location_id: LocationId::from("LOC-001"),
            pick_up_date_time: pick_up,
            start_date_time: None,
            end_date_time: None,
            status: RecordStatus::Active,
        }
    }

    #[test]
    fn rental_phase_follows_timestamps() {
        let mut record = rental();
        assert_eq!(record.phase(), RentalPhase::Booked);

        record.start_date_time = Some(record.pick_up_date_time);
        assert_eq!(record.phase(), RentalPhase::Active);

        record.end_date_time = Some(record.pick_up_date_time);
        assert_eq!(record.phase(), RentalPhase::Completed);
    }

    #[test]
    fn inactive_rental_reads_as_cancelled() {
        let mut record = rental();
        record.set_active(false);
        assert_eq!(record.phase(), RentalPhase::Cancelled);
    }

    #[test]
    fn vehicle_reactivation_returns_to_available() {
        let mut vehicle = Vehicle {
            plate_id: PlateId::from("ES-001"),
            vehicle_type: "E-Scooter".to_string(),
            status: VehicleStatus::Maintenance,
            rental_price: Decimal::from(50),
        };
        vehicle.set_active(true);
        assert_eq!(vehicle.status, VehicleStatus::Maintenance);

        vehicle.set_active(false);
        assert!(!vehicle.is_active());
        vehicle.set_active(true);
        assert!(vehicle.is_available());
    }

    #[test]
    fn status_labels_match_stored_values() {
        assert_eq!(VehicleStatus::InUse.label(), "In Use");
        assert_eq!("In Use".parse::<VehicleStatus>(), Ok(VehicleStatus::InUse));
        assert_eq!("paid".parse::<PenaltyStatus>(), Ok(PenaltyStatus::Paid));
        assert!("Retired".parse::<RecordStatus>().is_err());
        assert_eq!(
            serde_json::to_value(VehicleStatus::InUse).expect("serializes"),
            serde_json::json!("In Use")
        );
        assert_eq!(
            serde_json::to_value(PenaltyStatus::Unpaid).expect("serializes"),
            serde_json::json!("UNPAID")
        );
    }

    #[test]
    fn cancelled_deployments_are_not_current() {
        let mut deployment = DeploymentTransaction {
            deployment_id: DeploymentId::from("DEP-0001"),
            plate_id: PlateId::from("ES-001"),
            location_id: LocationId::from("LOC-001"),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid"),
            end_date: None,
            status: DeploymentStatus::Active,
        };
        assert!(deployment.is_current());
        deployment.set_active(false);
        assert!(!deployment.is_current());
    }
}
