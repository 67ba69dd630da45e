pub mod csv_filter;
pub mod filter;
pub mod plot;
pub mod report;
pub mod util;
