//! ABCI query helpers for chain module state (validators, proposals, params).

use crate::explorer::decode::{short_type_name, Coin, ProtoAny, Timestamp};
use crate::explorer::session::SessionClient;
use crate::explorer::types::ExplorerError;
use crate::types::AbciQueryResponse;
use chrono::{DateTime, Utc};
use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PATH_STAKING_VALIDATORS: &str = "/cosmos.staking.v1beta1.Query/Validators";
pub const PATH_STAKING_PARAMS: &str = "/cosmos.staking.v1beta1.Query/Params";
pub const PATH_MINT_PARAMS: &str = "/cosmos.mint.v1beta1.Query/Params";
pub const PATH_GOV_PROPOSALS: &str = "/cosmos.gov.v1.Query/Proposals";
pub const PATH_GOV_PARAMS: &str = "/cosmos.gov.v1.Query/Params";
pub const PATH_DISTRIBUTION_PARAMS: &str = "/cosmos.distribution.v1beta1.Query/Params";
pub const PATH_SLASHING_PARAMS: &str = "/cosmos.slashing.v1beta1.Query/Params";
pub const PATH_CUSTOM_MINT_PARAMS: &str = "/x.custommint.types.Query/Params";
pub const PATH_PAXI_CIRCULATING_SUPPLY: &str = "/x.paxi.types.Query/CirculatingSupply";
pub const PATH_PAXI_TOTAL_SUPPLY: &str = "/x.paxi.types.Query/TotalSupply";
pub const PATH_PAXI_LOCKED_VESTING: &str = "/x.paxi.types.Query/LockedVesting";

pub const BOND_STATUS_BONDED: &str = "BOND_STATUS_BONDED";

#[derive(Clone, PartialEq, Message)]
pub struct PageRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub offset: u64,
    #[prost(uint64, tag = "3")]
    pub limit: u64,
    #[prost(bool, tag = "4")]
    pub count_total: bool,
    #[prost(bool, tag = "5")]
    pub reverse: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct PageResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub next_key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub total: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryValidatorsRequest {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(message, optional, tag = "2")]
    pub pagination: Option<PageRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Description {
    #[prost(string, tag = "1")]
    pub moniker: String,
    #[prost(string, tag = "2")]
    pub identity: String,
    #[prost(string, tag = "3")]
    pub website: String,
    #[prost(string, tag = "4")]
    pub security_contact: String,
    #[prost(string, tag = "5")]
    pub details: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Validator {
    #[prost(string, tag = "1")]
    pub operator_address: String,
    #[prost(bool, tag = "3")]
    pub jailed: bool,
    #[prost(int32, tag = "4")]
    pub status: i32,
    #[prost(string, tag = "5")]
    pub tokens: String,
    #[prost(string, tag = "6")]
    pub delegator_shares: String,
    #[prost(message, optional, tag = "7")]
    pub description: Option<Description>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryValidatorsResponse {
    #[prost(message, repeated, tag = "1")]
    pub validators: Vec<Validator>,
    #[prost(message, optional, tag = "2")]
    pub pagination: Option<PageResponse>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryProposalsRequest {
    #[prost(int32, tag = "1")]
    pub proposal_status: i32,
    #[prost(string, tag = "2")]
    pub voter: String,
    #[prost(string, tag = "3")]
    pub depositor: String,
    #[prost(message, optional, tag = "4")]
    pub pagination: Option<PageRequest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Proposal {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<ProtoAny>,
    #[prost(int32, tag = "3")]
    pub status: i32,
    #[prost(message, optional, tag = "5")]
    pub submit_time: Option<Timestamp>,
    #[prost(message, optional, tag = "6")]
    pub deposit_end_time: Option<Timestamp>,
    #[prost(message, repeated, tag = "7")]
    pub total_deposit: Vec<Coin>,
    #[prost(message, optional, tag = "8")]
    pub voting_start_time: Option<Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub voting_end_time: Option<Timestamp>,
    #[prost(string, tag = "10")]
    pub metadata: String,
    #[prost(string, tag = "11")]
    pub title: String,
    #[prost(string, tag = "12")]
    pub summary: String,
    #[prost(string, tag = "13")]
    pub proposer: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryProposalsResponse {
    #[prost(message, repeated, tag = "1")]
    pub proposals: Vec<Proposal>,
    #[prost(message, optional, tag = "2")]
    pub pagination: Option<PageResponse>,
}

/// Validator row as shown in validator lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSummary {
    pub operator_address: String,
    pub moniker: String,
    pub jailed: bool,
    pub tokens: String,
    pub delegator_shares: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorPage {
    pub validators: Vec<ValidatorSummary>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: u64,
    pub title: String,
    pub status: String,
    pub proposer: String,
    pub submit_time: Option<DateTime<Utc>>,
    pub voting_end_time: Option<DateTime<Utc>>,
    /// Short names of the proposal's messages, e.g. `MsgUpdateParams`
    pub message_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalPage {
    pub proposals: Vec<ProposalSummary>,
    pub total: u64,
}

/// Pagination for zero-based page `page` of `per_page` items.
pub fn page_request(page: u32, per_page: u32, reverse: bool) -> PageRequest {
    PageRequest {
        key: Vec::new(),
        offset: u64::from(page) * u64::from(per_page),
        limit: u64::from(per_page),
        count_total: true,
        reverse,
    }
}

pub fn proposal_status_name(status: i32) -> &'static str {
    match status {
        1 => "PROPOSAL_STATUS_DEPOSIT_PERIOD",
        2 => "PROPOSAL_STATUS_VOTING_PERIOD",
        3 => "PROPOSAL_STATUS_PASSED",
        4 => "PROPOSAL_STATUS_REJECTED",
        5 => "PROPOSAL_STATUS_FAILED",
        _ => "PROPOSAL_STATUS_UNSPECIFIED",
    }
}

/// Bonded validators, one page at a time.
pub async fn query_active_validators(
    session: &SessionClient,
    page: u32,
    per_page: u32,
) -> Result<ValidatorPage, ExplorerError> {
    let request = QueryValidatorsRequest {
        status: BOND_STATUS_BONDED.to_string(),
        pagination: Some(page_request(page, per_page, false)),
    };
    let value = query_checked(session, PATH_STAKING_VALIDATORS, &request.encode_to_vec()).await?;
    decode_validator_page(&value)
}

/// Governance proposals, newest first.
pub async fn query_proposals(session: &SessionClient, page: u32, per_page: u32) -> Result<ProposalPage, ExplorerError> {
    let request = QueryProposalsRequest {
        pagination: Some(page_request(page, per_page, true)),
        ..Default::default()
    };
    let value = query_checked(session, PATH_GOV_PROPOSALS, &request.encode_to_vec()).await?;
    decode_proposal_page(&value)
}

/// Sends an empty request to `path` and returns the raw response bytes.
/// Parameter queries take no arguments.
pub async fn query_raw(session: &SessionClient, path: &str) -> Result<Vec<u8>, ExplorerError> {
    query_checked(session, path, &[]).await
}

async fn query_checked(session: &SessionClient, path: &str, data: &[u8]) -> Result<Vec<u8>, ExplorerError> {
    let response: AbciQueryResponse = session.abci_query(path, data).await?;
    if !response.is_ok() {
        return Err(ExplorerError::Query(format!(
            "{} returned code {}: {}",
            path, response.code, response.log
        )));
    }
    debug!("{} returned {} bytes at height {}", path, response.value.len(), response.height);
    Ok(response.value)
}

pub fn decode_validator_page(bytes: &[u8]) -> Result<ValidatorPage, ExplorerError> {
    let response = QueryValidatorsResponse::decode(bytes)
        .map_err(|e| ExplorerError::Decode(format!("QueryValidatorsResponse: {}", e)))?;
    Ok(ValidatorPage {
        total: response.pagination.map(|p| p.total).unwrap_or(0),
        validators: response
            .validators
            .into_iter()
            .map(|v| ValidatorSummary {
                operator_address: v.operator_address,
                moniker: v.description.map(|d| d.moniker).unwrap_or_default(),
                jailed: v.jailed,
                tokens: v.tokens,
                delegator_shares: v.delegator_shares,
            })
            .collect(),
    })
}

pub fn decode_proposal_page(bytes: &[u8]) -> Result<ProposalPage, ExplorerError> {
    let response = QueryProposalsResponse::decode(bytes)
        .map_err(|e| ExplorerError::Decode(format!("QueryProposalsResponse: {}", e)))?;
    Ok(ProposalPage {
        total: response.pagination.map(|p| p.total).unwrap_or(0),
        proposals: response
            .proposals
            .into_iter()
            .map(|p| ProposalSummary {
                id: p.id,
                status: proposal_status_name(p.status).to_string(),
                submit_time: p.submit_time.as_ref().and_then(to_datetime),
                voting_end_time: p.voting_end_time.as_ref().and_then(to_datetime),
                message_types: p
                    .messages
                    .iter()
                    .map(|m| short_type_name(&m.type_url).to_string())
                    .collect(),
                title: p.title,
                proposer: p.proposer,
            })
            .collect(),
    })
}

fn to_datetime(ts: &Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.seconds, u32::try_from(ts.nanos).ok()?)
}
