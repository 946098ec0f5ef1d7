pub mod csv_store;
pub mod gbis;
