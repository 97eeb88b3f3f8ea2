use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Boffo API",
        description = "Inventory and distribution backend for the Boffo Baby dashboard"
    ),
    paths(
        crate::handlers::users::login,
        crate::handlers::users::create_user,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::company::add_batch,
        crate::handlers::company::distribute_stock,
        crate::handlers::goods_requests::create_goods_request,
        crate::handlers::goods_requests::cancel_goods_request,
        crate::handlers::goods_requests::approve_goods_request,
        crate::handlers::sales::record_sale,
        crate::handlers::resellers::get_reseller_account,
        crate::handlers::payments::record_payment,
        crate::handlers::stock_movements::list_stock_movements,
        crate::handlers::page_data::admin_page_data,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::product::Model,
        crate::entities::product_batch::Model,
        crate::entities::reseller_stock::Model,
        crate::entities::stock_distribution::Model,
        crate::entities::sale::Model,
        crate::entities::payment::Model,
        crate::entities::stock_movement::Model,
        crate::entities::alert::Model,
        crate::entities::goods_request::GoodsRequestLine,
        crate::entities::goods_request::GoodsRequestStatus,
        crate::entities::payment::PaymentMethod,
        crate::entities::payment::RecordedBy,
        crate::entities::stock_movement::MovementType,
        crate::entities::stock_movement::MovementSource,
        crate::entities::stock_movement::StockOwner,
        crate::handlers::common::Pagination,
        crate::handlers::goods_requests::GoodsRequestBody,
        crate::handlers::goods_requests::DecisionBody,
        crate::services::catalog::CreateProductRequest,
        crate::services::catalog::UpdateProductRequest,
        crate::services::catalog::ProductSummary,
        crate::services::catalog::ProductFormOption,
        crate::services::inventory::AddBatchRequest,
        crate::services::distribution::DistributeStockRequest,
        crate::services::sales::RecordSaleRequest,
        crate::services::payments::RecordPaymentRequest,
        crate::services::resellers::ResellerAccount,
        crate::services::resellers::UpdateStockThresholdRequest,
        crate::services::users::CreateUserRequest,
        crate::services::users::UpdateUserRequest,
        crate::services::users::LoginRequest,
        crate::services::users::ChangePasswordRequest,
        crate::services::users::UserResponse,
        crate::services::users::UserSummary,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Accounts and authentication"),
        (name = "Products", description = "Product catalog"),
        (name = "Company", description = "Batches, company stock and distributions"),
        (name = "GoodsRequests", description = "Reseller stock requests and admin decisions"),
        (name = "Sales", description = "Reseller sales"),
        (name = "Resellers", description = "Reseller stock and accounts"),
        (name = "Payments", description = "Payment ledger"),
        (name = "StockMovements", description = "Stock audit ledger"),
        (name = "PageData", description = "Per-page statistics bundles"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).expect("openapi serializes");
        assert!(json.contains("/api/v1/goods-requests"));
        assert!(json.contains("bearer_auth"));
    }
}
