pub mod order;
pub mod order_item;
pub mod oversell_incident;
pub mod product;
pub mod product_variant;
