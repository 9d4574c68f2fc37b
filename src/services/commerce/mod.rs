/// Commerce services module - cart, pricing and the checkout core
pub mod cart_service;
pub mod checkout_service;
pub mod order_materializer;
pub mod pricing_service;

// Re-export services for convenience
pub use cart_service::{CartLine, CartService, CartSnapshot};
pub use checkout_service::{
    CheckoutInput, CheckoutOutcome, CheckoutService, FinalizeInput, PaymentSource,
    SimulatedCheckoutInput,
};
pub use order_materializer::{MaterializeRequest, MaterializedLine, MaterializedOrder, OrderMaterializer};
pub use pricing_service::PricingService;
