/// Time source abstraction
pub mod clock;
/// Group lifecycle controller
pub mod group;
/// Participant ledger operations
pub mod ledger;
/// Group events and notification delivery
pub mod notify;
/// Order status updates and group-driven resolution
pub mod order;
/// Version-checked record updates
pub mod record;
/// Sales, inventory, customer and group reports
pub mod report;
/// Group status state machine
pub mod threshold;
