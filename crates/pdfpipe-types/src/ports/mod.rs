pub mod converter;
pub mod metadata_store;
pub mod object_store;
pub mod part_tracker;

pub use converter::{ConverterData, ConverterResponse, PdfConverter};
pub use metadata_store::MetadataStore;
pub use object_store::{ObjectStore, UploadedObject};
pub use part_tracker::PartTrackerStore;
