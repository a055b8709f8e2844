//! Lead search filters: schema, compiler and relaxation.
//!
//! Stages:
//! - [`normalize`]: raw model output → flat, correctly-shaped object
//! - [`repair`]: loose enum strings → typed values, plus title rules
//! - [`compiler`]: orchestration of the above with strict/lenient validation
//! - [`relax`]: dimension removal when a search returns nothing

pub mod compiler;
pub mod locations;
pub mod normalize;
pub mod relax;
pub mod repair;
pub mod schema;
pub mod tables;

pub use compiler::{coerce, FilterCompiler};
pub use locations::{resolve_location, resolve_locations, ResolvedLocations};
pub use relax::{broaden, Broadened, LeadCounter, RelaxStep};
pub use schema::SearchFilters;
