//! Unified error codes
//!
//! Error codes are organized by domain:
//! - 0xxx: General errors
//! - 1xxx: Table errors
//! - 2xxx: Routing errors
//! - 3xxx: Scheduling errors
//! - 4xxx: Camera / pipeline errors
//! - 5xxx: Staff / visit errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient
/// serialization and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Optimistic-concurrency conflict: caller should retry or abort
    Conflict = 6,
    /// Value out of range
    ValueOutOfRange = 7,

    // ==================== 1xxx: Table ====================
    /// Table not found
    TableNotFound = 1001,
    /// Requested state transition is not allowed
    InvalidTransition = 1002,
    /// Table is already occupied
    TableOccupied = 1003,
    /// Table number already used within the restaurant
    TableNumberTaken = 1004,

    // ==================== 2xxx: Routing ====================
    /// No clean table can hold the party
    NoTablesAvailable = 2001,
    /// No waiter with an active shift can take the party
    NoWaitersAvailable = 2002,
    /// Hard preference could not be satisfied
    PreferenceUnsatisfiable = 2003,
    /// Another caller seated the same table first
    SeatConflict = 2004,
    /// Waitlist entry not found
    WaitlistEntryNotFound = 2005,
    /// Waitlist entry already seated or walked away
    WaitlistEntryClosed = 2006,

    // ==================== 3xxx: Scheduling ====================
    /// Schedule not found
    ScheduleNotFound = 3001,
    /// An engine run is already in progress for this week
    RunInProgress = 3002,
    /// Schedule run not found
    RunNotFound = 3003,
    /// Schedule is not in a publishable state
    NotPublishable = 3004,

    // ==================== 4xxx: Camera / pipeline ====================
    /// Camera not registered
    CameraNotFound = 4001,
    /// Crop JSON failed to parse or is structurally invalid
    CropJsonInvalid = 4002,
    /// Classifier rejected the request credentials
    ClassifierAuth = 4003,
    /// Classifier could not be reached
    ClassifierUnavailable = 4004,
    /// Prediction referenced a json-table-id with no physical mapping
    UnmappedTable = 4005,

    // ==================== 5xxx: Staff / visit ====================
    /// Waiter not found
    WaiterNotFound = 5001,
    /// Waiter already has an open shift
    ShiftAlreadyOpen = 5002,
    /// Shift not found or already ended
    ShiftNotFound = 5003,
    /// Visit not found
    VisitNotFound = 5004,
    /// Visit already cleared
    VisitClosed = 5005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// State store unavailable; retry when health returns
    ServiceUnavailable = 9003,
    /// Operation timed out
    Timeout = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default human-readable message for this code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::Conflict => "Conflict, please retry",
            Self::ValueOutOfRange => "Value out of range",

            Self::TableNotFound => "Table not found",
            Self::InvalidTransition => "Invalid table state transition",
            Self::TableOccupied => "Table is already occupied",
            Self::TableNumberTaken => "Table number already in use",

            Self::NoTablesAvailable => "No available tables for this party size",
            Self::NoWaitersAvailable => "No available waiters",
            Self::PreferenceUnsatisfiable => "Party preference cannot be satisfied",
            Self::SeatConflict => "Table was seated by another request",
            Self::WaitlistEntryNotFound => "Waitlist entry not found",
            Self::WaitlistEntryClosed => "Waitlist entry is no longer waiting",

            Self::ScheduleNotFound => "Schedule not found",
            Self::RunInProgress => "A scheduling run is already in progress for this week",
            Self::RunNotFound => "Schedule run not found",
            Self::NotPublishable => "Schedule cannot be published in its current state",

            Self::CameraNotFound => "Camera not registered",
            Self::CropJsonInvalid => "Crop JSON is invalid",
            Self::ClassifierAuth => "Classifier rejected credentials",
            Self::ClassifierUnavailable => "Classifier unavailable",
            Self::UnmappedTable => "No physical table mapped for json table id",

            Self::WaiterNotFound => "Waiter not found",
            Self::ShiftAlreadyOpen => "Waiter already has an open shift",
            Self::ShiftNotFound => "Shift not found or already ended",
            Self::VisitNotFound => "Visit not found",
            Self::VisitClosed => "Visit already cleared",

            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ServiceUnavailable => "Service temporarily unavailable",
            Self::Timeout => "Operation timed out",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Self::Success => StatusCode::OK,
            Self::ValidationFailed | Self::InvalidRequest | Self::ValueOutOfRange => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound
            | Self::TableNotFound
            | Self::WaitlistEntryNotFound
            | Self::ScheduleNotFound
            | Self::RunNotFound
            | Self::CameraNotFound
            | Self::WaiterNotFound
            | Self::ShiftNotFound
            | Self::VisitNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists
            | Self::Conflict
            | Self::TableOccupied
            | Self::TableNumberTaken
            | Self::SeatConflict
            | Self::RunInProgress
            | Self::ShiftAlreadyOpen
            | Self::WaitlistEntryClosed
            | Self::VisitClosed => StatusCode::CONFLICT,
            Self::InvalidTransition | Self::NotPublishable | Self::CropJsonInvalid => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::NoTablesAvailable
            | Self::NoWaitersAvailable
            | Self::PreferenceUnsatisfiable
            | Self::UnmappedTable => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ClassifierAuth => StatusCode::BAD_GATEWAY,
            Self::ClassifierUnavailable | Self::ServiceUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unknown | Self::InternalError | Self::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the category for this error code
    pub fn category(&self) -> super::ErrorCategory {
        super::ErrorCategory::from_code(self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,
            6 => Self::Conflict,
            7 => Self::ValueOutOfRange,
            1001 => Self::TableNotFound,
            1002 => Self::InvalidTransition,
            1003 => Self::TableOccupied,
            1004 => Self::TableNumberTaken,
            2001 => Self::NoTablesAvailable,
            2002 => Self::NoWaitersAvailable,
            2003 => Self::PreferenceUnsatisfiable,
            2004 => Self::SeatConflict,
            2005 => Self::WaitlistEntryNotFound,
            2006 => Self::WaitlistEntryClosed,
            3001 => Self::ScheduleNotFound,
            3002 => Self::RunInProgress,
            3003 => Self::RunNotFound,
            3004 => Self::NotPublishable,
            4001 => Self::CameraNotFound,
            4002 => Self::CropJsonInvalid,
            4003 => Self::ClassifierAuth,
            4004 => Self::ClassifierUnavailable,
            4005 => Self::UnmappedTable,
            5001 => Self::WaiterNotFound,
            5002 => Self::ShiftAlreadyOpen,
            5003 => Self::ShiftNotFound,
            5004 => Self::VisitNotFound,
            5005 => Self::VisitClosed,
            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            9003 => Self::ServiceUnavailable,
            9004 => Self::Timeout,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}
