//! JSON:API documents exchanged with clients.

use airdrop_types::Claim;
use airdrop_verification::ClaimRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CREATE_AIRDROP: &str = "create_airdrop";
pub const AIRDROP: &str = "airdrop";
pub const AIRDROP_PARAMS: &str = "airdrop_params";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource<A> {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: A,
}

/// Body of `POST /airdrops`.
pub type CreateAirdropRequest = Document<Resource<ClaimRequest>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropAttributes {
    pub claim_id: String,
    pub address: String,
    pub amount: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type AirdropResponse = Document<Resource<AirdropAttributes>>;

/// The public view of a claim. The in-flight attempt hash stays internal.
pub fn airdrop_response(claim: &Claim) -> AirdropResponse {
    Document {
        data: Resource {
            id: claim.nullifier.clone(),
            kind: AIRDROP.to_string(),
            attributes: AirdropAttributes {
                claim_id: claim.id.to_string(),
                address: claim.address.to_string(),
                amount: claim.amount.to_string(),
                status: claim.status.to_string(),
                tx_hash: claim.tx_hash.as_ref().map(|h| h.to_string()),
                created_at: claim.created_at,
                updated_at: claim.updated_at,
            },
        },
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropParamsAttributes {
    pub event_id: String,
    pub query_selector: String,
    /// Unix seconds.
    pub started_at: i64,
}

pub type AirdropParamsResponse = Document<Resource<AirdropParamsAttributes>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_types::{AccountAddress, ClaimStatus, Coin, TxHash};
    use chrono::TimeZone;

    #[test]
    fn create_request_parses() {
        let body = serde_json::json!({
            "data": {
                "type": "create_airdrop",
                "attributes": {
                    "address": "drop_abc",
                    "algorithm": "groth16",
                    "zk_proof": { "proof": { "pi_a": [] }, "pub_signals": ["1", "2"] }
                }
            }
        });
        let req: CreateAirdropRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.data.kind, CREATE_AIRDROP);
        assert_eq!(req.data.attributes.address, "drop_abc");
        assert_eq!(req.data.attributes.zk_proof.pub_signals.len(), 2);
    }

    #[test]
    fn response_hides_attempt_hash() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut claim = Claim::new_pending(
            "abc123",
            AccountAddress::new("drop_abc"),
            Coin::new(100, "urmo"),
            now,
        );
        claim.attempt_tx_hash = Some(TxHash::new("SECRET"));
        let json = serde_json::to_value(airdrop_response(&claim)).unwrap();
        assert_eq!(json["data"]["id"], "abc123");
        assert_eq!(json["data"]["type"], "airdrop");
        assert_eq!(json["data"]["attributes"]["amount"], "100urmo");
        assert_eq!(json["data"]["attributes"]["status"], "pending");
        assert!(json["data"]["attributes"].get("tx_hash").is_none());
        assert!(!json.to_string().contains("SECRET"));

        claim.status = ClaimStatus::Completed;
        claim.tx_hash = Some(TxHash::new("0xdead"));
        let json = serde_json::to_value(airdrop_response(&claim)).unwrap();
        assert_eq!(json["data"]["attributes"]["tx_hash"], "0xdead");
    }
}
