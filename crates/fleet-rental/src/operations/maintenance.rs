use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{
    MaintenanceId, MaintenanceLineItem, MaintenanceTransaction, Part, PartId, PlateId,
    RecordStatus, TechnicianId, VehicleStatus,
};
use super::error::FleetError;
use super::ids::MAINTENANCE_IDS;
use super::money::{elapsed_hours, round_currency, round_hours};
use super::repository::{FleetStore, RepositoryError};

/// Request to open a maintenance job. A missing id is allocated from the `MNT` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMaintenance {
    #[serde(default)]
    pub maintenance_id: Option<MaintenanceId>,
    pub plate_id: PlateId,
    pub technician_id: TechnicianId,
    #[serde(default)]
    pub notes: String,
    pub start_date_time: NaiveDateTime,
}

/// Quantity of one part consumed when a job is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartUsage {
    pub part_id: PartId,
    pub quantity: u32,
}

/// Labor and parts split of a job's cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub labor: Decimal,
    pub parts: Decimal,
    pub total: Decimal,
}

/// Repair scheduling, completion, and the parts ledger that drives job cost.
pub struct MaintenanceService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> MaintenanceService<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn schedule_maintenance(
        &self,
        request: ScheduleMaintenance,
    ) -> Result<MaintenanceTransaction, FleetError> {
        let plate_id = request.plate_id.clone();
        self.store
            .atomically(|| {
                self.require_active_vehicle(&request.plate_id)?;
                if self.store.technicians().fetch(&request.technician_id)?.is_none() {
                    return Err(FleetError::not_found("technician", &request.technician_id));
                }

                let maintenance_id = match request.maintenance_id {
                    Some(id) => id,
                    None => self.next_maintenance_id(),
                };
                let record = self.store.maintenance().insert(MaintenanceTransaction {
                    maintenance_id,
                    plate_id: request.plate_id,
                    technician_id: Some(request.technician_id),
                    start_date_time: request.start_date_time,
                    end_date_time: None,
                    notes: request.notes,
                    hours_worked: None,
                    total_cost: Decimal::ZERO,
                    status: RecordStatus::Active,
                })?;
                self.store
                    .vehicles()
                    .update_status(&record.plate_id, VehicleStatus::Maintenance)?;
                Ok(record)
            })
            .inspect(|record| {
                info!(maintenance_id = %record.maintenance_id, %plate_id, "maintenance scheduled")
            })
            .inspect_err(|err| warn!(%plate_id, error = %err, "maintenance scheduling rejected"))
    }

    /// Open a job for a reported defect without assigning a technician yet.
    pub fn flag_vehicle_as_defective(
        &self,
        plate_id: &PlateId,
        notes: &str,
    ) -> Result<MaintenanceTransaction, FleetError> {
        self.store
            .atomically(|| {
                self.require_active_vehicle(plate_id)?;
                let record = self.store.maintenance().insert(MaintenanceTransaction {
                    maintenance_id: self.next_maintenance_id(),
                    plate_id: plate_id.clone(),
                    technician_id: None,
                    start_date_time: self.clock.now(),
                    end_date_time: None,
                    notes: notes.to_string(),
                    hours_worked: None,
                    total_cost: Decimal::ZERO,
                    status: RecordStatus::Active,
                })?;
                self.store
                    .vehicles()
                    .update_status(plate_id, VehicleStatus::Maintenance)?;
                Ok(record)
            })
            .inspect(|record| {
                info!(maintenance_id = %record.maintenance_id, %plate_id, "vehicle flagged as defective")
            })
            .inspect_err(|err| warn!(%plate_id, error = %err, "defect report rejected"))
    }

    /// Close a job once. Every part is checked for stock before anything is written.
    pub fn complete_maintenance(
        &self,
        maintenance_id: &MaintenanceId,
        end_date_time: NaiveDateTime,
        parts_used: &[PartUsage],
    ) -> Result<MaintenanceTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut record = self.fetch_active_maintenance(maintenance_id)?;
                if !record.is_in_progress() {
                    return Err(FleetError::invalid_state(format!(
                        "maintenance {maintenance_id} is already completed"
                    )));
                }
                if end_date_time < record.start_date_time {
                    return Err(FleetError::validation(format!(
                        "maintenance {maintenance_id} cannot end before it started"
                    )));
                }

                let requested = consolidate(parts_used)?;
                for (part_id, quantity) in &requested {
                    self.require_stock(part_id, *quantity)?;
                }
                for (part_id, quantity) in &requested {
                    self.consume_part(maintenance_id, part_id, *quantity)?;
                }

                record.end_date_time = Some(end_date_time);
                record.hours_worked =
                    Some(round_hours(elapsed_hours(record.start_date_time, end_date_time)));
                self.store.maintenance().update(record.clone())?;
                let total_cost = self.persist_total_cost(maintenance_id)?;
                record.total_cost = total_cost;

                let vehicle = self
                    .store
                    .vehicles()
                    .fetch(&record.plate_id)?
                    .ok_or_else(|| FleetError::not_found("vehicle", &record.plate_id))?;
                if vehicle.status == VehicleStatus::Inactive {
                    warn!(plate_id = %vehicle.plate_id, "vehicle retired during maintenance, leaving inactive");
                } else {
                    self.store
                        .vehicles()
                        .update_status(&record.plate_id, VehicleStatus::Available)?;
                }
                Ok(record)
            })
            .inspect(|record| {
                info!(%maintenance_id, total_cost = %record.total_cost, "maintenance completed")
            })
            .inspect_err(|err| warn!(%maintenance_id, error = %err, "maintenance completion rejected"))
    }

    /// `hours_worked * technician.rate`, rounded half-up to cents. Zero while either is unknown.
    pub fn calculate_labor_cost(&self, maintenance_id: &MaintenanceId) -> Result<Decimal, FleetError> {
        let record = self.fetch_maintenance(maintenance_id)?;
        let (Some(hours), Some(technician_id)) = (record.hours_worked, record.technician_id.as_ref())
        else {
            return Ok(Decimal::ZERO);
        };
        match self.store.technicians().fetch(technician_id)? {
            Some(technician) => Ok(round_currency(hours * technician.rate)),
            None => {
                warn!(%maintenance_id, %technician_id, "technician missing, labor not billed");
                Ok(Decimal::ZERO)
            }
        }
    }

    /// Sum of `price * quantity` per active line item, each term rounded before summing.
    pub fn calculate_parts_cost(&self, maintenance_id: &MaintenanceId) -> Result<Decimal, FleetError> {
        let items = self.store.line_items().by_maintenance(maintenance_id, false)?;
        let mut total = Decimal::ZERO;
        for item in items {
            match self.store.parts().fetch(&item.part_id)? {
                Some(part) => total += round_currency(part.price * Decimal::from(item.quantity_used)),
                None => {
                    warn!(%maintenance_id, part_id = %item.part_id, "part missing, skipped in cost")
                }
            }
        }
        Ok(total)
    }

    pub fn calculate_total_cost(&self, maintenance_id: &MaintenanceId) -> Result<CostBreakdown, FleetError> {
        let labor = self.calculate_labor_cost(maintenance_id)?;
        let parts = self.calculate_parts_cost(maintenance_id)?;
        Ok(CostBreakdown {
            labor,
            parts,
            total: labor + parts,
        })
    }

    /// Re-derive and persist the cached `total_cost`.
    pub fn recalculate_maintenance_cost(
        &self,
        maintenance_id: &MaintenanceId,
    ) -> Result<Decimal, FleetError> {
        self.store
            .atomically(|| self.persist_total_cost(maintenance_id))
            .inspect(|total| info!(%maintenance_id, %total, "maintenance cost recalculated"))
    }

    /// Attach a part to a job, taking the units out of stock. A removed line item for the same
    /// part comes back with the new quantity.
    pub fn add_line_item_with_inventory(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
        quantity: u32,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.store
            .atomically(|| {
                self.fetch_active_maintenance(maintenance_id)?;
                if quantity == 0 {
                    return Err(FleetError::validation("line item quantity must be positive"));
                }
                let existing = self.store.line_items().fetch_item(maintenance_id, part_id)?;
                if existing.is_some_and(|item| item.status == RecordStatus::Active) {
                    return Err(FleetError::invalid_state(format!(
                        "part {part_id} is already on maintenance {maintenance_id}"
                    )));
                }
                let item = self.consume_part(maintenance_id, part_id, quantity)?;
                self.persist_total_cost(maintenance_id)?;
                Ok(item)
            })
            .inspect(|item| info!(%maintenance_id, %part_id, quantity = item.quantity_used, "line item added"))
            .inspect_err(|err| warn!(%maintenance_id, %part_id, error = %err, "line item rejected"))
    }

    /// Change a line item's quantity, moving only the difference in or out of stock.
    pub fn update_line_item_with_inventory(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
        new_quantity: u32,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.store
            .atomically(|| {
                let mut item = self.fetch_line_item(maintenance_id, part_id)?;
                if !matches!(item.status, RecordStatus::Active) {
                    return Err(FleetError::invalid_state(format!(
                        "line item {} is inactive",
                        item.key()
                    )));
                }
                if new_quantity == 0 {
                    return Err(FleetError::validation(
                        "line item quantity must be positive; deactivate it instead",
                    ));
                }

                let previous = item.quantity_used;
                if new_quantity > previous {
                    let extra = new_quantity - previous;
                    self.require_stock(part_id, extra)?;
                    self.store.parts().decrement_quantity(part_id, extra)?;
                } else if new_quantity < previous {
                    self.store
                        .parts()
                        .increment_quantity(part_id, previous - new_quantity)?;
                }

                item.quantity_used = new_quantity;
                self.store.line_items().update(item.clone())?;
                self.persist_total_cost(maintenance_id)?;
                Ok(item)
            })
            .inspect(|item| info!(%maintenance_id, %part_id, quantity = item.quantity_used, "line item updated"))
            .inspect_err(|err| warn!(%maintenance_id, %part_id, error = %err, "line item update rejected"))
    }

    /// Soft-delete a line item and return its units to stock.
    pub fn deactivate_line_item_with_inventory(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.store
            .atomically(|| {
                let mut item = self.fetch_line_item(maintenance_id, part_id)?;
                if item.status == RecordStatus::Inactive {
                    return Err(FleetError::invalid_state(format!(
                        "line item {} is already inactive",
                        item.key()
                    )));
                }
                self.store
                    .parts()
                    .increment_quantity(part_id, item.quantity_used)?;
                self.store.line_items().deactivate(&item.key())?;
                self.persist_total_cost(maintenance_id)?;
                item.status = RecordStatus::Inactive;
                Ok(item)
            })
            .inspect(|_| info!(%maintenance_id, %part_id, "line item deactivated"))
            .inspect_err(|err| warn!(%maintenance_id, %part_id, error = %err, "line item deactivation rejected"))
    }

    /// Restore a soft-deleted line item, taking its units back out of stock.
    pub fn reactivate_line_item_with_inventory(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.store
            .atomically(|| {
                let mut item = self.fetch_line_item(maintenance_id, part_id)?;
                if item.status == RecordStatus::Active {
                    return Err(FleetError::invalid_state(format!(
                        "line item {} is already active",
                        item.key()
                    )));
                }
                self.require_stock(part_id, item.quantity_used)?;
                self.store
                    .parts()
                    .decrement_quantity(part_id, item.quantity_used)?;
                self.store.line_items().reactivate(&item.key())?;
                self.persist_total_cost(maintenance_id)?;
                item.status = RecordStatus::Active;
                Ok(item)
            })
            .inspect(|_| info!(%maintenance_id, %part_id, "line item reactivated"))
            .inspect_err(|err| warn!(%maintenance_id, %part_id, error = %err, "line item reactivation rejected"))
    }

    pub fn maintenance(&self, maintenance_id: &MaintenanceId) -> Result<MaintenanceTransaction, FleetError> {
        self.fetch_maintenance(maintenance_id)
    }

    pub fn line_items(&self, maintenance_id: &MaintenanceId) -> Result<Vec<MaintenanceLineItem>, FleetError> {
        Ok(self.store.line_items().by_maintenance(maintenance_id, false)?)
    }

    pub fn maintenance_for_vehicle(
        &self,
        plate_id: &PlateId,
    ) -> Result<Vec<MaintenanceTransaction>, FleetError> {
        Ok(self.store.maintenance().by_vehicle(plate_id)?)
    }

    pub fn maintenance_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<MaintenanceTransaction>, FleetError> {
        Ok(self.store.maintenance().by_technician(technician_id)?)
    }

    pub fn in_progress_maintenance(&self) -> Result<Vec<MaintenanceTransaction>, FleetError> {
        Ok(self.store.maintenance().in_progress()?)
    }

    fn persist_total_cost(&self, maintenance_id: &MaintenanceId) -> Result<Decimal, FleetError> {
        let breakdown = self.calculate_total_cost(maintenance_id)?;
        let mut record = self.fetch_maintenance(maintenance_id)?;
        record.total_cost = breakdown.total;
        self.store.maintenance().update(record)?;
        Ok(breakdown.total)
    }

    /// Insert or top up the job's line item for `part_id` and deduct the units from stock.
    fn consume_part(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
        quantity: u32,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.require_stock(part_id, quantity)?;
        let item = match self.store.line_items().fetch_item(maintenance_id, part_id)? {
            Some(mut existing) => {
                existing.quantity_used = if existing.status == RecordStatus::Active {
                    existing.quantity_used + quantity
                } else {
                    quantity
                };
                existing.status = RecordStatus::Active;
                self.store.line_items().update(existing.clone())?;
                existing
            }
            None => self.store.line_items().insert(MaintenanceLineItem {
                maintenance_id: maintenance_id.clone(),
                part_id: part_id.clone(),
                quantity_used: quantity,
                status: RecordStatus::Active,
            })?,
        };
        self.store
            .parts()
            .decrement_quantity(part_id, quantity)
            .map_err(|err| match err {
                RepositoryError::Rejected(reason) => FleetError::validation(reason),
                other => FleetError::from(other),
            })?;
        Ok(item)
    }

    fn require_stock(&self, part_id: &PartId, quantity: u32) -> Result<Part, FleetError> {
        let part = self
            .store
            .parts()
            .fetch(part_id)?
            .ok_or_else(|| FleetError::not_found("part", part_id))?;
        if part.status != RecordStatus::Active {
            return Err(FleetError::invalid_state(format!("part {part_id} is inactive")));
        }
        if !part.has_stock(quantity) {
            return Err(FleetError::validation(format!(
                "insufficient stock for part {part_id}: {} on hand, {quantity} requested",
                part.quantity
            )));
        }
        Ok(part)
    }

    fn require_active_vehicle(&self, plate_id: &PlateId) -> Result<(), FleetError> {
        let vehicle = self
            .store
            .vehicles()
            .fetch(plate_id)?
            .ok_or_else(|| FleetError::not_found("vehicle", plate_id))?;
        if vehicle.status == VehicleStatus::Inactive {
            return Err(FleetError::invalid_state(format!("vehicle {plate_id} is inactive")));
        }
        Ok(())
    }

    fn fetch_maintenance(&self, maintenance_id: &MaintenanceId) -> Result<MaintenanceTransaction, FleetError> {
        self.store
            .maintenance()
            .fetch(maintenance_id)?
            .ok_or_else(|| FleetError::not_found("maintenance", maintenance_id))
    }

    fn fetch_active_maintenance(
        &self,
        maintenance_id: &MaintenanceId,
    ) -> Result<MaintenanceTransaction, FleetError> {
        let record = self.fetch_maintenance(maintenance_id)?;
        if record.status != RecordStatus::Active {
            return Err(FleetError::invalid_state(format!(
                "maintenance {maintenance_id} is inactive"
            )));
        }
        Ok(record)
    }

    fn fetch_line_item(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
    ) -> Result<MaintenanceLineItem, FleetError> {
        self.store
            .line_items()
            .fetch_item(maintenance_id, part_id)?
            .ok_or_else(|| FleetError::not_found("maintenance line item", format!("{maintenance_id}/{part_id}")))
    }

    fn next_maintenance_id(&self) -> MaintenanceId {
        let scan = self.store.maintenance().list_including_inactive().map(|records| {
            records
                .into_iter()
                .map(|record| record.maintenance_id.0)
                .collect()
        });
        MaintenanceId::new(MAINTENANCE_IDS.allocate(scan, self.clock.now()))
    }
}

/// Merge repeated parts so stock is checked against the combined quantity.
fn consolidate(parts_used: &[PartUsage]) -> Result<BTreeMap<PartId, u32>, FleetError> {
    let mut requested = BTreeMap::new();
    for usage in parts_used {
        if usage.quantity == 0 {
            return Err(FleetError::validation(format!(
                "quantity for part {} must be positive",
                usage.part_id
            )));
        }
        let total: &mut u32 = requested.entry(usage.part_id.clone()).or_insert(0);
        *total = total.checked_add(usage.quantity).ok_or_else(|| {
            FleetError::validation(format!("quantity overflow for part {}", usage.part_id))
        })?;
    }
    Ok(requested)
}
