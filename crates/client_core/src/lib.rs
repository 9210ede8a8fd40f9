//! Client side of the roster: the record store client, local image
//! storage and the view state coordinator that ties them together.

pub mod coordinator;
pub mod images;
pub mod store;

pub use coordinator::{
    CoordinatorError, RefreshPolicy, SaveOutcome, ViewState, ViewStateCoordinator,
};
pub use images::ImageStore;
pub use store::{HttpRecordStore, MemoryRecordStore, RecordStore};
