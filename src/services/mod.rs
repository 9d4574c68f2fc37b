// Checkout core
pub mod commerce;

// Payments
pub mod card_vault;
pub mod payment_gateway;
pub mod payment_methods;

// Orders and receipts
pub mod notifications;
pub mod orders;
pub mod receipts;
