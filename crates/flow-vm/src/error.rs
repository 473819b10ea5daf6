//! Flow error taxonomy.
//!
//! Build-time failures surface as `Result` values from the program cache
//! and are logged by the driver; they prevent flow creation but never
//! abort the tick loop. Run-time failures inside a VM (stale handle,
//! wrong register tag) deliberately degrade to silent no-ops instead.

use flow_bytecode::BytecodeError;
use flow_db::UnitHandle;
use thiserror::Error;

use crate::tag::FlowTag;

/// Errors from flow resolution, compilation, and resource acquisition.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The triggering event's subject handle did not validate.
    #[error("invalid unit handle {0}")]
    InvalidHandle(UnitHandle),

    /// A definition rejected the triggering event.
    #[error("invalid event data for flow {tag}")]
    InvalidEventData { tag: FlowTag },

    /// No definition registered for the tag or any of its ancestors.
    #[error("no flow definition for tag {tag}")]
    FlowDefinitionNotFound { tag: FlowTag },

    /// A built program names an opcode with no installed handler.
    #[error("no handler registered for opcode 0x{0:02X}")]
    OpcodeNotFound(u8),

    /// A definition's emission failed.
    #[error("building flow {tag} failed")]
    BuildFailed {
        tag: FlowTag,
        #[source]
        source: BytecodeError,
    },

    /// The VM pool hit its active cap.
    #[error("vm pool exhausted")]
    PoolExhausted,

    /// A spatial query could not be serviced (reserved for host-supplied
    /// query opcodes; the built-in grid cannot fail).
    #[error("spatial index query failed")]
    SpatialIndexFailed,
}

/// Result alias for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;
