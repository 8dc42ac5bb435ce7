//! Domain models
//!
//! Plain serde structs for every persisted entity. Row mapping derives
//! (`sqlx::FromRow` / `sqlx::Type`) are gated behind the `db` feature so
//! that tooling can depend on the types without pulling the database stack.
//!
//! Conventions:
//! - ids are opaque UUID strings (`util::new_id`)
//! - timestamps are i64 Unix millis (UTC)
//! - calendar fields (schedule dates/times) use `chrono::NaiveDate` /
//!   `NaiveTime`, stored as TEXT
//! - JSON columns are carried as raw `String` with typed accessors

pub mod camera;
pub mod menu;
pub mod metrics;
pub mod restaurant;
pub mod scheduling;
pub mod section;
pub mod shift;
pub mod table;
pub mod visit;
pub mod waiter;
pub mod waitlist;

pub use camera::{
    Camera, CameraRegister, CropDispatchLog, CropJson, CropSize, CropTable, DispatchStatus,
    JsonTableId, Prediction, RotatedBbox,
};
pub use menu::{OrderItem, OrderItemCreate};
pub use metrics::{MenuItemMetricsRow, PeriodType, RestaurantMetricsRow, WaiterMetricsRow};
pub use restaurant::{AlertSettings, Restaurant, RestaurantConfig, RoutingMode, RoutingSettings};
pub use scheduling::{
    AvailabilityType, GeneratedBy, RunStatus, Schedule, ScheduleItem, ScheduleReasoning,
    ScheduleRun, ScheduleStatus, ShiftType, StaffAvailability, StaffPreference,
    StaffingRequirement,
};
pub use section::Section;
pub use shift::{Shift, ShiftStatus};
pub use table::{
    DiningTable, DiningTableCreate, StateSource, TableLocation, TableState, TableStateLog,
    TableType,
};
pub use visit::{Visit, VisitTotals};
pub use waiter::{Waiter, WaiterCreate, WaiterRole, WaiterTier};
pub use waitlist::{LocationPreference, TablePreference, WaitlistEntry, WaitlistStatus};
