//! HTTP client for `swap-node`'s REST surface. Mirrors the teacher's
//! `RpcClient` shape (a thin `reqwest::Client` wrapper keyed by base URL)
//! but speaks the node's plain JSON endpoints rather than JSON-RPC, since
//! that's the wire format the node actually exposes.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct NodeClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
pub struct GetAddressRequest<'a> {
    pub address: &'a str,
    pub amount: String,
    #[serde(rename = "exactOut")]
    pub exact_out: bool,
    pub token: &'a str,
    #[serde(rename = "paymentHash")]
    pub payment_hash: &'a str,
    #[serde(rename = "scriptPubkey")]
    pub script_pubkey: &'a str,
    #[serde(rename = "refundAddress", skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreateInvoiceRequest<'a> {
    #[serde(rename = "paymentHash")]
    pub payment_hash: &'a str,
    pub amount: String,
    #[serde(rename = "exactOut")]
    pub exact_out: bool,
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TrustedCreateInvoiceRequest<'a> {
    #[serde(rename = "paymentHash")]
    pub payment_hash: &'a str,
    pub amount: String,
    pub token: &'a str,
    #[serde(rename = "refundAddress", skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ToBtcGetAddressRequest<'a> {
    #[serde(rename = "paymentHash")]
    pub payment_hash: &'a str,
    pub amount: String,
    #[serde(rename = "exactOut")]
    pub exact_out: bool,
    pub token: &'a str,
    #[serde(rename = "destinationAddress")]
    pub destination_address: &'a str,
    #[serde(rename = "scriptPubkey")]
    pub script_pubkey: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PayInvoiceRequest<'a> {
    #[serde(rename = "paymentHash")]
    pub payment_hash: &'a str,
    pub bolt11: &'a str,
    #[serde(rename = "amountMsat")]
    pub amount_msat: u64,
    pub token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct QuoteResponse {
    pub code: u32,
    pub msg: String,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceStatusResponse {
    pub code: u32,
    pub msg: String,
}

impl NodeClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to parse response from {url}"))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to parse response from {url}"))
    }

    pub async fn from_btc_get_address(&self, req: &GetAddressRequest<'_>) -> Result<QuoteResponse> {
        self.post("/from-btc-onchain/getAddress", req).await
    }

    pub async fn from_btc_ln_create_invoice(&self, req: &CreateInvoiceRequest<'_>) -> Result<QuoteResponse> {
        self.post("/from-btc-lightning/createInvoice", req).await
    }

    pub async fn to_btc_get_address(&self, req: &ToBtcGetAddressRequest<'_>) -> Result<QuoteResponse> {
        self.post("/to-btc-onchain/getAddress", req).await
    }

    pub async fn to_btc_ln_pay_invoice(&self, req: &PayInvoiceRequest<'_>) -> Result<QuoteResponse> {
        self.post("/to-btc-lightning/payInvoice", req).await
    }

    pub async fn trusted_from_btc_ln_create_invoice(
        &self,
        req: &TrustedCreateInvoiceRequest<'_>,
    ) -> Result<QuoteResponse> {
        self.post("/trusted-from-btc-lightning/createInvoice", req).await
    }

    pub async fn invoice_status(&self, direction: &str, payment_hash: &str) -> Result<InvoiceStatusResponse> {
        self.get(&format!("/{direction}/getInvoiceStatus"), &[("paymentHash", payment_hash)])
            .await
    }

    pub async fn info(&self, nonce: &str) -> Result<Value> {
        #[derive(Serialize)]
        struct InfoRequest<'a> {
            nonce: &'a str,
        }
        self.post("/info", &InfoRequest { nonce }).await
    }
}

pub fn require_code_ok(code: u32, msg: &str) -> Result<()> {
    if code != 10000 {
        bail!("node returned error {code}: {msg}");
    }
    Ok(())
}
