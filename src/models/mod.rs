pub mod booking;
pub mod hold;
pub mod pricing;
pub mod seat;
pub mod selection;
pub mod show;

pub use booking::Booking;
pub use hold::{Hold, HoldReceipt, HoldToken, HoldView};
pub use pricing::{PriceCategory, ScarcityLabel};
pub use seat::{Seat, SeatCategory, SeatStatus, SeatView};
pub use selection::{SelectionError, SelectionEvent, SelectionPhase};
pub use show::{Show, ShowSummary};

pub type ShowId = i64;
pub type SeatId = i64;
