//! Per-direction REST handlers (§6). Registered under `/{dir}/...` where
//! `dir` matches `Direction::as_str()`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::{web, HttpResponse};
use tracing::info;

use swap_core::SwapCore;

use crate::error::ApiError;

use super::types::{
    amount_spec, parse_amount, parse_payment_hash, CreateInvoiceRequest, GetAddressRequest,
    InfoRequest, InvoiceStatusQuery, InvoiceStatusResponse, PayInvoiceRequest, QuoteResponse,
    ToBtcGetAddressRequest, TrustedCreateInvoiceRequest,
};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/from-btc-onchain/getAddress", web::post().to(from_btc_get_address))
        .route("/from-btc-onchain/getInvoiceStatus", web::get().to(from_btc_status))
        .route("/from-btc-lightning/createInvoice", web::post().to(from_btc_ln_create_invoice))
        .route("/from-btc-lightning/getInvoiceStatus", web::get().to(from_btc_ln_status))
        .route("/to-btc-onchain/getAddress", web::post().to(to_btc_get_address))
        .route("/to-btc-onchain/getInvoiceStatus", web::get().to(to_btc_status))
        .route("/to-btc-lightning/payInvoice", web::post().to(to_btc_ln_pay_invoice))
        .route("/to-btc-lightning/getInvoiceStatus", web::get().to(to_btc_ln_status))
        .route(
            "/trusted-from-btc-lightning/createInvoice",
            web::post().to(trusted_from_btc_ln_create_invoice),
        )
        .route(
            "/trusted-from-btc-lightning/getInvoiceStatus",
            web::get().to(trusted_from_btc_ln_status),
        )
        .route("/info", web::post().to(info))
        .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"code": 10000, "msg": "ok"}))
}

async fn from_btc_get_address(
    core: web::Data<Arc<SwapCore>>,
    body: web::Json<GetAddressRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let payment_hash = parse_payment_hash(&req.payment_hash)?;
    let amount = parse_amount(&req.amount)?;
    let script_pubkey =
        hex::decode(&req.script_pubkey).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let swap = core
        .quote_from_btc(
            payment_hash,
            &req.address,
            &req.token,
            amount_spec(req.exact_out),
            amount,
            req.address.clone(),
            &script_pubkey,
            req.refund_address.clone(),
            unix_now(),
        )
        .await?;

    info!(payment_hash = %payment_hash, direction = "from-btc-onchain", "quote issued");
    let swap = swap_core::Swap::FromBtc(swap);
    Ok(HttpResponse::Ok().json(QuoteResponse::from_swap(&swap, Some(req.address), None)))
}

async fn from_btc_ln_create_invoice(
    core: web::Data<Arc<SwapCore>>,
    body: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let payment_hash = parse_payment_hash(&req.payment_hash)?;
    let amount = parse_amount(&req.amount)?;

    let swap = core
        .quote_from_btc_ln(
            payment_hash,
            "user",
            &req.token,
            amount_spec(req.exact_out),
            amount,
            unix_now(),
        )
        .await?;

    info!(payment_hash = %payment_hash, direction = "from-btc-lightning", "quote issued");
    let bolt11 = swap.bolt11.clone();
    let swap = swap_core::Swap::FromBtcLn(swap);
    Ok(HttpResponse::Ok().json(QuoteResponse::from_swap(&swap, None, Some(bolt11))))
}

async fn to_btc_get_address(
    core: web::Data<Arc<SwapCore>>,
    body: web::Json<ToBtcGetAddressRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let payment_hash = parse_payment_hash(&req.payment_hash)?;
    let amount = parse_amount(&req.amount)?;
    let script_pubkey =
        hex::decode(&req.script_pubkey).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let swap = core
        .quote_to_btc(
            payment_hash,
            "user",
            &req.token,
            amount_spec(req.exact_out),
            amount,
            req.destination_address,
            &script_pubkey,
            unix_now(),
        )
        .await?;

    info!(payment_hash = %payment_hash, direction = "to-btc-onchain", "quote issued");
    let swap = swap_core::Swap::ToBtc(swap);
    Ok(HttpResponse::Ok().json(QuoteResponse::from_swap(&swap, None, None)))
}

async fn to_btc_ln_pay_invoice(
    core: web::Data<Arc<SwapCore>>,
    body: web::Json<PayInvoiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let payment_hash = parse_payment_hash(&req.payment_hash)?;

    let swap = core
        .quote_to_btc_ln(payment_hash, "user", &req.token, req.bolt11, req.amount_msat, unix_now())
        .await?;

    info!(payment_hash = %payment_hash, direction = "to-btc-lightning", "quote issued");
    let swap = swap_core::Swap::ToBtcLn(swap);
    Ok(HttpResponse::Ok().json(QuoteResponse::from_swap(&swap, None, None)))
}

async fn trusted_from_btc_ln_create_invoice(
    core: web::Data<Arc<SwapCore>>,
    body: web::Json<TrustedCreateInvoiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let payment_hash = parse_payment_hash(&req.payment_hash)?;
    let amount = parse_amount(&req.amount)?;

    let swap = core
        .quote_trusted_from_btc_ln(payment_hash, &req.token, amount, req.refund_address, unix_now())
        .await?;

    info!(payment_hash = %payment_hash, direction = "trusted-from-btc-lightning", "quote issued");
    let bolt11 = swap.bolt11.clone();
    let swap = swap_core::Swap::TrustedFromBtcLn(swap);
    Ok(HttpResponse::Ok().json(QuoteResponse::from_swap(&swap, None, Some(bolt11))))
}

async fn status_for(core: &SwapCore, query: InvoiceStatusQuery) -> Result<HttpResponse, ApiError> {
    let hash = parse_payment_hash(&query.payment_hash)?;
    let swap = core.storage.get(hash).await?.ok_or(ApiError::UnknownSwap)?;
    Ok(HttpResponse::Ok().json(InvoiceStatusResponse::from_swap(&swap)))
}

async fn from_btc_status(
    core: web::Data<Arc<SwapCore>>,
    query: web::Query<InvoiceStatusQuery>,
) -> Result<HttpResponse, ApiError> {
    status_for(&core, query.into_inner()).await
}

async fn from_btc_ln_status(
    core: web::Data<Arc<SwapCore>>,
    query: web::Query<InvoiceStatusQuery>,
) -> Result<HttpResponse, ApiError> {
    status_for(&core, query.into_inner()).await
}

async fn to_btc_status(
    core: web::Data<Arc<SwapCore>>,
    query: web::Query<InvoiceStatusQuery>,
) -> Result<HttpResponse, ApiError> {
    status_for(&core, query.into_inner()).await
}

async fn to_btc_ln_status(
    core: web::Data<Arc<SwapCore>>,
    query: web::Query<InvoiceStatusQuery>,
) -> Result<HttpResponse, ApiError> {
    status_for(&core, query.into_inner()).await
}

async fn trusted_from_btc_ln_status(
    core: web::Data<Arc<SwapCore>>,
    query: web::Query<InvoiceStatusQuery>,
) -> Result<HttpResponse, ApiError> {
    status_for(&core, query.into_inner()).await
}

async fn info(
    identity: web::Data<Arc<swap_core::identity::IdentityService>>,
    services: web::Data<crate::node::ServiceCatalog>,
    body: web::Json<InfoRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let envelope = serde_json::json!({
        "nonce": req.nonce,
        "services": services.as_json(),
    });
    let signature = identity
        .sign_envelope(&envelope)
        .map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "address": identity.address(),
        "envelope": envelope,
        "signature": signature,
    })))
}
