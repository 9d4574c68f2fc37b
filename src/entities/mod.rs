pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod stored_payment_method;
pub mod user;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Entity as Payment, Model as PaymentModel, PaymentMethodKind};
pub use product::{Entity as Product, Model as ProductModel};
pub use stored_payment_method::{Entity as StoredPaymentMethod, Model as StoredPaymentMethodModel};
pub use user::{Entity as User, Model as UserModel};
