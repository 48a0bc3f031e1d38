//! The semantic layer: plan validation and join resolution.
//!
//! Everything here is pure and CPU-bound. The validator runs a fixed battery
//! of checks over a canonical plan and returns the complete batch of errors
//! and warnings; the resolver finds deterministic join paths over the
//! approved-join graph. Neither touches I/O.

pub mod resolve;
pub mod validate;

pub use resolve::{JoinPath, JoinResolver, JoinStep, ResolveError};
pub use validate::{
    validate_question, PlanValidator, ValidationCode, ValidationError, ValidationReport,
    ValidationWarning,
};
