pub mod scan_store;

pub use scan_store::ScanStore;
