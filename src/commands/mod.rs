pub mod recognize;
pub mod select;

pub use recognize::{PlateOutcome, PlateReport, PlateService};
pub use select::collect_image_ids;
