pub mod catalog;
pub mod journal;
pub mod sweeper;

pub use catalog::CatalogLoader;
pub use journal::BookingJournal;
pub use sweeper::HoldSweeper;
