/// Source and output constants shared across the pipeline

// Chicago Department of Public Health food inspections dataset (Socrata)
pub const DEFAULT_SOURCE_URL: &str = "https://data.cityofchicago.org/resource/4ijn-s7e5.json";
pub const DEFAULT_PAGE_SIZE: u64 = 50_000;
pub const DATE_FIELD: &str = "inspection_date";

// The OLTP schema is the main database; the warehouse is ATTACHed under
// this name.
pub const OLAP_SCHEMA: &str = "foodinspectionDW";

pub const DEFAULT_OLTP_PATH: &str = "data/foodinspection.db";
pub const DEFAULT_OLAP_PATH: &str = "data/foodinspectionDW.db";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const OLTP_EXPORT_FILE: &str = "food-inspections-OLTP.csv";
pub const OLAP_EXPORT_FILE: &str = "food-inspections-OLAP.csv";

// Markers inside raw inspection text
pub const VIOLATION_SEPARATOR: char = '|';
pub const ORDINAL_SEPARATOR: &str = ". ";
pub const COMMENTS_MARKER: &str = "- Comments:";
pub const CONDITIONS_MARKER: &str = "w/ Conditions";
pub const PASS_TEXT: &str = "Pass";

// Environment overrides
pub const ENV_OLTP_DB: &str = "FOOD_INSPECTIONS_DB";
pub const ENV_OLAP_DB: &str = "FOOD_INSPECTIONS_DW";
pub const ENV_APP_TOKEN: &str = "SOCRATA_APP_TOKEN";
pub const ENV_METRICS_ADDR: &str = "FOOD_INSPECTIONS_METRICS_ADDR";
