//! Raw record-set structures for perturbation experiments.

mod obs_table;
mod record_set;
mod response;

pub use obs_table::{ObsTable, Variable};
pub use record_set::{FieldMap, FieldMapping, PerturbationData};
pub use response::ResponseMatrix;
