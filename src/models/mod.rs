pub mod event;
pub mod guest_session;
pub mod order;
pub mod photo;
pub mod product;

pub use event::{Event, EventStatus};
pub use guest_session::GuestSession;
pub use order::{Order, OrderAmounts, OrderItem, OrderStatus, PaymentRecord, SelectedOption, ShippingInfo};
pub use photo::Photo;
pub use product::{Product, ProductOption, ProductOptionValue};
