pub mod alert;
pub mod goods_request;
pub mod payment;
pub mod product;
pub mod product_batch;
pub mod reseller_lot;
pub mod reseller_stock;
pub mod sale;
pub mod stock_distribution;
pub mod stock_movement;
pub mod stock_movement_batch;
pub mod user;
