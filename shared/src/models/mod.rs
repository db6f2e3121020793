//! Domain models for the stone lot selector

mod candidate;
mod command;
mod diagnostic;
mod domain;
mod filters;
mod grouping;
mod odoo;
mod relational;
mod selection;

pub use candidate::*;
pub use command::*;
pub use diagnostic::*;
pub use domain::*;
pub use filters::*;
pub use grouping::*;
pub use odoo::*;
pub use relational::*;
pub use selection::*;
