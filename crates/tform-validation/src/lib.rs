//! # tform-validation — Section Validation & Hosts
//!
//! Validates one form data tree against an ordered list of sections, each
//! with its own schema and context, and keeps one error tree per section.
//!
//! ## Modules
//!
//! - **section**: [`Section`], the schema/context/title unit. Validation of a
//!   section never fails; schema failures and panics become messages on the
//!   section's own tree, so one broken section cannot affect another.
//! - **orchestrator**: [`FormValidation`], the `Idle → Touched → Validating →
//!   Valid | Invalid → Idle` state machine. Sections of a pass run
//!   concurrently and are joined. [`SchemaValidation`] is the one-section
//!   form.
//! - **host**: [`AccordionHost`] (scroll to the first invalid section, force
//!   open sections with errors) and [`WizardHost`] (one section per step,
//!   the last step submits).
//! - **definition**: YAML/JSON form definitions compiled into sections.
//! - **form**: [`Form`], a store and its validation passed around together,
//!   with optional re-validation on every edit.
//!
//! ## Crate Policy
//!
//! - Status is published through `tokio::sync::watch`; no locks are held
//!   across `.await`.
//! - Libraries only emit `tracing` events; installing a subscriber is the
//!   application's job.
//! - No `.unwrap()` outside tests.

pub mod definition;
pub mod form;
pub mod host;
pub mod orchestrator;
pub mod section;

pub use definition::{DefinitionError, FormDefinition, SectionDefinition, ValidationConfig};
pub use form::Form;
pub use host::{AccordionHost, ScrollTarget, SectionStatus, WizardHost, WizardOutcome};
pub use orchestrator::{
    FormValidation, RunState, SchemaValidation, SubmitOutcome, ValidationPhase,
    ValidationStateError, ValidationStatus,
};
pub use section::Section;
