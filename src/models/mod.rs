//! Domain models - the JSON document shapes exchanged with the store.
//! Field names follow the camelCase document convention.

pub mod group;
pub mod notification;
pub mod order;
pub mod product;

pub use group::{
    CreateGroupBuyData, GroupBuy, GroupPatch, GroupStatus, Participant, ParticipantPayment,
};
pub use notification::{Notification, NotificationPreferences, NotificationType};
pub use order::{Order, OrderItem, OrderStatus, OrderUpdate, PaymentMethod, PaymentStatus};
pub use product::{Inventory, Product, ProductStatus};
