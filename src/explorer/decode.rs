//! Transaction and message decoding.
//!
//! Raw transactions are content-addressed by SHA-256 and decoded as
//! `TxRaw -> TxBody`. Each message inside the body is dispatched on its type
//! URL against a fixed catalog. Unknown type URLs and undecodable payloads
//! yield a `None` payload instead of an error, so a bad message never takes
//! down the feed handler.

use crate::explorer::types::ExplorerError;
use crate::types::{DecodedMsg, DecodedTxBody};
use base64::{engine::general_purpose, Engine as _};
use prost::Message;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_WITHDRAW_DELEGATOR_REWARD: &str = "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const MSG_DELEGATE: &str = "/cosmos.staking.v1beta1.MsgDelegate";
pub const MSG_UNDELEGATE: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
pub const MSG_EXEC: &str = "/cosmos.authz.v1beta1.MsgExec";
pub const MSG_GRANT: &str = "/cosmos.authz.v1beta1.MsgGrant";
pub const MSG_REVOKE: &str = "/cosmos.authz.v1beta1.MsgRevoke";
pub const MSG_TRANSFER: &str = "/ibc.applications.transfer.v1.MsgTransfer";
pub const MSG_EXECUTE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
pub const MSG_INSTANTIATE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgInstantiateContract";
pub const MSG_MIGRATE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgMigrateContract";
pub const MSG_STORE_CODE: &str = "/cosmwasm.wasm.v1.MsgStoreCode";
pub const MSG_UPDATE_CLIENT: &str = "/ibc.core.client.v1.MsgUpdateClient";
pub const MSG_RECV_PACKET: &str = "/ibc.core.channel.v1.MsgRecvPacket";
pub const MSG_ACKNOWLEDGEMENT: &str = "/ibc.core.channel.v1.MsgAcknowledgement";
pub const MSG_PROVIDE_LIQUIDITY: &str = "/x.swap.types.MsgProvideLiquidity";
pub const MSG_WITHDRAW_LIQUIDITY: &str = "/x.swap.types.MsgWithdrawLiquidity";
pub const MSG_SWAP: &str = "/x.swap.types.MsgSwap";

/// Nested `MsgExec` payloads deeper than this are not decoded.
const MAX_NESTING: usize = 8;

// --- Wire messages ---

#[derive(Clone, PartialEq, Message)]
pub struct ProtoAny {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<ProtoAny>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgWithdrawDelegatorReward {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
}

/// Shared layout of `MsgDelegate` and `MsgUndelegate`.
#[derive(Clone, PartialEq, Message)]
pub struct MsgDelegate {
    #[prost(string, tag = "1")]
    pub delegator_address: String,
    #[prost(string, tag = "2")]
    pub validator_address: String,
    #[prost(message, optional, tag = "3")]
    pub amount: Option<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgExec {
    #[prost(string, tag = "1")]
    pub grantee: String,
    #[prost(message, repeated, tag = "2")]
    pub msgs: Vec<ProtoAny>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Grant {
    #[prost(message, optional, tag = "1")]
    pub authorization: Option<ProtoAny>,
    #[prost(message, optional, tag = "2")]
    pub expiration: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgGrant {
    #[prost(string, tag = "1")]
    pub granter: String,
    #[prost(string, tag = "2")]
    pub grantee: String,
    #[prost(message, optional, tag = "3")]
    pub grant: Option<Grant>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgRevoke {
    #[prost(string, tag = "1")]
    pub granter: String,
    #[prost(string, tag = "2")]
    pub grantee: String,
    #[prost(string, tag = "3")]
    pub msg_type_url: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Height {
    #[prost(uint64, tag = "1")]
    pub revision_number: u64,
    #[prost(uint64, tag = "2")]
    pub revision_height: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgTransfer {
    #[prost(string, tag = "1")]
    pub source_port: String,
    #[prost(string, tag = "2")]
    pub source_channel: String,
    #[prost(message, optional, tag = "3")]
    pub token: Option<Coin>,
    #[prost(string, tag = "4")]
    pub sender: String,
    #[prost(string, tag = "5")]
    pub receiver: String,
    #[prost(message, optional, tag = "6")]
    pub timeout_height: Option<Height>,
    #[prost(uint64, tag = "7")]
    pub timeout_timestamp: u64,
    #[prost(string, tag = "8")]
    pub memo: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgExecuteContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub contract: String,
    #[prost(bytes = "vec", tag = "3")]
    pub msg: Vec<u8>,
    #[prost(message, repeated, tag = "5")]
    pub funds: Vec<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgInstantiateContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub admin: String,
    #[prost(uint64, tag = "3")]
    pub code_id: u64,
    #[prost(string, tag = "4")]
    pub label: String,
    #[prost(bytes = "vec", tag = "5")]
    pub msg: Vec<u8>,
    #[prost(message, repeated, tag = "6")]
    pub funds: Vec<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgMigrateContract {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub contract: String,
    #[prost(uint64, tag = "3")]
    pub code_id: u64,
    #[prost(bytes = "vec", tag = "4")]
    pub msg: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgStoreCode {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(bytes = "vec", tag = "2")]
    pub wasm_byte_code: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgUpdateClient {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(message, optional, tag = "2")]
    pub client_message: Option<ProtoAny>,
    #[prost(string, tag = "3")]
    pub signer: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Packet {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(string, tag = "2")]
    pub source_port: String,
    #[prost(string, tag = "3")]
    pub source_channel: String,
    #[prost(string, tag = "4")]
    pub destination_port: String,
    #[prost(string, tag = "5")]
    pub destination_channel: String,
    #[prost(bytes = "vec", tag = "6")]
    pub data: Vec<u8>,
    #[prost(message, optional, tag = "7")]
    pub timeout_height: Option<Height>,
    #[prost(uint64, tag = "8")]
    pub timeout_timestamp: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgRecvPacket {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<Packet>,
    #[prost(bytes = "vec", tag = "2")]
    pub proof_commitment: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub proof_height: Option<Height>,
    #[prost(string, tag = "4")]
    pub signer: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgAcknowledgement {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<Packet>,
    #[prost(bytes = "vec", tag = "2")]
    pub acknowledgement: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub proof_acked: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub proof_height: Option<Height>,
    #[prost(string, tag = "5")]
    pub signer: String,
}

/// Paxi swap: add liquidity to the PAXI/PRC-20 pool.
#[derive(Clone, PartialEq, Message)]
pub struct MsgProvideLiquidity {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub prc20: String,
    #[prost(string, tag = "3")]
    pub paxi_amount: String,
    #[prost(string, tag = "4")]
    pub prc20_amount: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgWithdrawLiquidity {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub prc20: String,
    #[prost(string, tag = "3")]
    pub lp_amount: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgSwap {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub prc20: String,
    #[prost(string, tag = "3")]
    pub offer_denom: String,
    #[prost(string, tag = "4")]
    pub offer_amount: String,
    #[prost(string, tag = "5")]
    pub min_receive: String,
}

// --- Decoding ---

/// Uppercase hex SHA-256 of the raw transaction bytes.
pub fn tx_hash(raw: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(raw))
}

/// Display name of a message type, e.g. `MsgSend` for the bank send type URL.
pub fn short_type_name(type_url: &str) -> &str {
    type_url.rsplit('.').next().unwrap_or(type_url)
}

/// Decodes raw transaction bytes into memo and messages.
pub fn decode_tx_body(raw: &[u8]) -> Result<DecodedTxBody, ExplorerError> {
    let tx_raw = TxRaw::decode(raw).map_err(|e| ExplorerError::Decode(format!("TxRaw: {}", e)))?;
    let body = TxBody::decode(tx_raw.body_bytes.as_slice())
        .map_err(|e| ExplorerError::Decode(format!("TxBody: {}", e)))?;

    Ok(DecodedTxBody {
        memo: body.memo,
        messages: body
            .messages
            .iter()
            .map(|any| decode_msg(&any.type_url, &any.value))
            .collect(),
    })
}

/// Decodes one message by type URL. Never fails: unknown types and malformed
/// payloads produce `data: None`.
pub fn decode_msg(type_url: &str, value: &[u8]) -> DecodedMsg {
    decode_msg_nested(type_url, value, 0)
}

fn decode_msg_nested(type_url: &str, value: &[u8], depth: usize) -> DecodedMsg {
    let data = match decode_payload(type_url, value, depth) {
        Ok(data) => data,
        Err(e) => {
            warn!(type_url = %type_url, "Failed to decode message payload: {}", e);
            None
        }
    };
    DecodedMsg {
        type_url: type_url.to_string(),
        data,
    }
}

fn decode_payload(type_url: &str, value: &[u8], depth: usize) -> Result<Option<Value>, prost::DecodeError> {
    let data = match type_url {
        MSG_SEND => {
            let m = MsgSend::decode(value)?;
            json!({
                "fromAddress": m.from_address,
                "toAddress": m.to_address,
                "amount": coins_json(&m.amount),
            })
        }
        MSG_WITHDRAW_DELEGATOR_REWARD => {
            let m = MsgWithdrawDelegatorReward::decode(value)?;
            json!({
                "delegatorAddress": m.delegator_address,
                "validatorAddress": m.validator_address,
            })
        }
        MSG_DELEGATE | MSG_UNDELEGATE => {
            let m = MsgDelegate::decode(value)?;
            json!({
                "delegatorAddress": m.delegator_address,
                "validatorAddress": m.validator_address,
                "amount": m.amount.as_ref().map(coin_json),
            })
        }
        MSG_EXEC => {
            let m = MsgExec::decode(value)?;
            let msgs: Vec<Value> = if depth >= MAX_NESTING {
                m.msgs.iter().map(|any| json!({ "typeUrl": any.type_url, "data": null })).collect()
            } else {
                m.msgs
                    .iter()
                    .map(|any| {
                        let inner = decode_msg_nested(&any.type_url, &any.value, depth + 1);
                        json!({ "typeUrl": inner.type_url, "data": inner.data })
                    })
                    .collect()
            };
            json!({ "grantee": m.grantee, "msgs": msgs })
        }
        MSG_GRANT => {
            let m = MsgGrant::decode(value)?;
            let grant = m.grant.map(|g| {
                json!({
                    "authorization": g.authorization.map(|a| json!({
                        "typeUrl": a.type_url,
                        "value": general_purpose::STANDARD.encode(&a.value),
                    })),
                    "expiration": g.expiration.map(|t| timestamp_json(&t)),
                })
            });
            json!({ "granter": m.granter, "grantee": m.grantee, "grant": grant })
        }
        MSG_REVOKE => {
            let m = MsgRevoke::decode(value)?;
            json!({ "granter": m.granter, "grantee": m.grantee, "msgTypeUrl": m.msg_type_url })
        }
        MSG_TRANSFER => {
            let m = MsgTransfer::decode(value)?;
            json!({
                "sourcePort": m.source_port,
                "sourceChannel": m.source_channel,
                "token": m.token.as_ref().map(coin_json),
                "sender": m.sender,
                "receiver": m.receiver,
                "timeoutHeight": m.timeout_height.as_ref().map(height_json),
                "timeoutTimestamp": m.timeout_timestamp.to_string(),
                "memo": m.memo,
            })
        }
        MSG_EXECUTE_CONTRACT => {
            let m = MsgExecuteContract::decode(value)?;
            json!({
                "sender": m.sender,
                "contract": m.contract,
                "msg": readable_contract_msg(&m.msg),
                "funds": coins_json(&m.funds),
            })
        }
        MSG_INSTANTIATE_CONTRACT => {
            let m = MsgInstantiateContract::decode(value)?;
            json!({
                "sender": m.sender,
                "admin": m.admin,
                "codeId": m.code_id.to_string(),
                "label": m.label,
                "msg": readable_contract_msg(&m.msg),
                "funds": coins_json(&m.funds),
            })
        }
        MSG_MIGRATE_CONTRACT => {
            let m = MsgMigrateContract::decode(value)?;
            json!({
                "sender": m.sender,
                "contract": m.contract,
                "codeId": m.code_id.to_string(),
                "msg": readable_contract_msg(&m.msg),
            })
        }
        MSG_STORE_CODE => {
            let m = MsgStoreCode::decode(value)?;
            // byte code is summarized, not inlined
            json!({
                "sender": m.sender,
                "wasmByteCodeSize": m.wasm_byte_code.len(),
                "wasmByteCodeHash": hex::encode_upper(Sha256::digest(&m.wasm_byte_code)),
            })
        }
        MSG_UPDATE_CLIENT => {
            let m = MsgUpdateClient::decode(value)?;
            json!({
                "clientId": m.client_id,
                "clientMessage": m.client_message.map(|a| json!({
                    "typeUrl": a.type_url,
                    "size": a.value.len(),
                })),
                "signer": m.signer,
            })
        }
        MSG_RECV_PACKET => {
            let m = MsgRecvPacket::decode(value)?;
            json!({
                "packet": m.packet.as_ref().map(packet_json),
                "proofHeight": m.proof_height.as_ref().map(height_json),
                "signer": m.signer,
            })
        }
        MSG_ACKNOWLEDGEMENT => {
            let m = MsgAcknowledgement::decode(value)?;
            json!({
                "packet": m.packet.as_ref().map(packet_json),
                "acknowledgement": general_purpose::STANDARD.encode(&m.acknowledgement),
                "proofHeight": m.proof_height.as_ref().map(height_json),
                "signer": m.signer,
            })
        }
        MSG_PROVIDE_LIQUIDITY => {
            let m = MsgProvideLiquidity::decode(value)?;
            json!({
                "creator": m.creator,
                "prc20": m.prc20,
                "paxiAmount": m.paxi_amount,
                "prc20Amount": m.prc20_amount,
            })
        }
        MSG_WITHDRAW_LIQUIDITY => {
            let m = MsgWithdrawLiquidity::decode(value)?;
            json!({ "creator": m.creator, "prc20": m.prc20, "lpAmount": m.lp_amount })
        }
        MSG_SWAP => {
            let m = MsgSwap::decode(value)?;
            json!({
                "creator": m.creator,
                "prc20": m.prc20,
                "offerDenom": m.offer_denom,
                "offerAmount": m.offer_amount,
                "minReceive": m.min_receive,
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(data))
}

fn coin_json(coin: &Coin) -> Value {
    json!({ "denom": coin.denom, "amount": coin.amount })
}

fn coins_json(coins: &[Coin]) -> Value {
    Value::Array(coins.iter().map(coin_json).collect())
}

fn height_json(h: &Height) -> Value {
    json!({
        "revisionNumber": h.revision_number.to_string(),
        "revisionHeight": h.revision_height.to_string(),
    })
}

/// Packet data is usually JSON (ICS-20); kept as base64 otherwise.
fn packet_json(p: &Packet) -> Value {
    let data = match serde_json::from_slice::<Value>(&p.data) {
        Ok(v) => v,
        Err(_) => Value::String(general_purpose::STANDARD.encode(&p.data)),
    };
    json!({
        "sequence": p.sequence.to_string(),
        "sourcePort": p.source_port,
        "sourceChannel": p.source_channel,
        "destinationPort": p.destination_port,
        "destinationChannel": p.destination_channel,
        "data": data,
        "timeoutHeight": p.timeout_height.as_ref().map(height_json),
        "timeoutTimestamp": p.timeout_timestamp.to_string(),
    })
}

fn timestamp_json(ts: &Timestamp) -> Value {
    match chrono::DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32) {
        Some(dt) => Value::String(dt.to_rfc3339()),
        None => json!({ "seconds": ts.seconds.to_string(), "nanos": ts.nanos }),
    }
}

/// Contract messages are JSON in UTF-8; show them parsed when possible.
fn readable_contract_msg(msg: &[u8]) -> Value {
    let parsed = std::str::from_utf8(msg)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(text).map_err(|e| e.to_string()));
    match parsed {
        Ok(v) => json!([v]),
        Err(e) => {
            warn!("Failed to parse contract msg as JSON: {}", e);
            Value::String(general_purpose::STANDARD.encode(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(type_url: &str, value: Vec<u8>) -> ProtoAny {
        ProtoAny {
            type_url: type_url.to_string(),
            value,
        }
    }

    fn send_msg() -> MsgSend {
        MsgSend {
            from_address: "paxi1from".to_string(),
            to_address: "paxi1to".to_string(),
            amount: vec![Coin {
                denom: "upaxi".to_string(),
                amount: "1000".to_string(),
            }],
        }
    }

    #[test]
    fn test_tx_hash_is_uppercase_sha256() {
        assert_eq!(
            tx_hash(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name(MSG_SEND), "MsgSend");
        assert_eq!(short_type_name("NoDots"), "NoDots");
    }

    #[test]
    fn test_unknown_type_url_yields_null_payload() {
        let decoded = decode_msg("/x.unknown.v1.MsgMystery", &[1, 2, 3]);
        assert_eq!(decoded.type_url, "/x.unknown.v1.MsgMystery");
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_malformed_known_type_yields_null_payload() {
        let decoded = decode_msg(MSG_SEND, &[0xff, 0xff, 0xff]);
        assert_eq!(decoded.type_url, MSG_SEND);
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_decode_msg_send() {
        let decoded = decode_msg(MSG_SEND, &send_msg().encode_to_vec());
        let data = decoded.data.unwrap();
        assert_eq!(data["fromAddress"], "paxi1from");
        assert_eq!(data["toAddress"], "paxi1to");
        assert_eq!(data["amount"][0]["denom"], "upaxi");
        assert_eq!(data["amount"][0]["amount"], "1000");
    }

    #[test]
    fn test_contract_msg_is_parsed_as_json() {
        let msg = MsgExecuteContract {
            sender: "paxi1sender".to_string(),
            contract: "paxi1contract".to_string(),
            msg: br#"{"transfer":{"amount":"5"}}"#.to_vec(),
            funds: vec![],
        };
        let data = decode_msg(MSG_EXECUTE_CONTRACT, &msg.encode_to_vec()).data.unwrap();
        assert_eq!(data["msg"][0]["transfer"]["amount"], "5");
    }

    #[test]
    fn test_contract_msg_falls_back_to_base64() {
        let msg = MsgMigrateContract {
            sender: "s".to_string(),
            contract: "c".to_string(),
            code_id: 7,
            msg: vec![0xc3, 0x28],
        };
        let data = decode_msg(MSG_MIGRATE_CONTRACT, &msg.encode_to_vec()).data.unwrap();
        assert_eq!(data["codeId"], "7");
        assert_eq!(data["msg"], general_purpose::STANDARD.encode([0xc3, 0x28]));
    }

    #[test]
    fn test_exec_decodes_nested_messages() {
        let exec = MsgExec {
            grantee: "paxi1grantee".to_string(),
            msgs: vec![
                any(MSG_SEND, send_msg().encode_to_vec()),
                any("/x.unknown.Msg", vec![]),
            ],
        };
        let data = decode_msg(MSG_EXEC, &exec.encode_to_vec()).data.unwrap();
        assert_eq!(data["grantee"], "paxi1grantee");
        assert_eq!(data["msgs"][0]["data"]["toAddress"], "paxi1to");
        assert!(data["msgs"][1]["data"].is_null());
    }

    #[test]
    fn test_decode_swap() {
        let swap = MsgSwap {
            creator: "paxi1trader".to_string(),
            prc20: "paxi1token".to_string(),
            offer_denom: "upaxi".to_string(),
            offer_amount: "250".to_string(),
            min_receive: "240".to_string(),
        };
        let decoded = decode_msg(MSG_SWAP, &swap.encode_to_vec());
        assert_eq!(short_type_name(&decoded.type_url), "MsgSwap");
        let data = decoded.data.unwrap();
        assert_eq!(data["prc20"], "paxi1token");
        assert_eq!(data["offerAmount"], "250");
        assert_eq!(data["minReceive"], "240");

        let withdraw = MsgWithdrawLiquidity {
            creator: "paxi1lp".to_string(),
            prc20: "paxi1token".to_string(),
            lp_amount: "10".to_string(),
        };
        let data = decode_msg(MSG_WITHDRAW_LIQUIDITY, &withdraw.encode_to_vec()).data.unwrap();
        assert_eq!(data["lpAmount"], "10");
    }

    #[test]
    fn test_decode_recv_packet_parses_json_data() {
        let recv = MsgRecvPacket {
            packet: Some(Packet {
                sequence: 12,
                source_port: "transfer".to_string(),
                source_channel: "channel-0".to_string(),
                data: br#"{"denom":"uatom","amount":"5"}"#.to_vec(),
                ..Default::default()
            }),
            signer: "paxi1relayer".to_string(),
            ..Default::default()
        };
        let data = decode_msg(MSG_RECV_PACKET, &recv.encode_to_vec()).data.unwrap();
        assert_eq!(data["packet"]["sequence"], "12");
        assert_eq!(data["packet"]["data"]["denom"], "uatom");
        assert_eq!(data["signer"], "paxi1relayer");
        assert!(data["proofHeight"].is_null());
    }

    #[test]
    fn test_decode_tx_body() {
        let body = TxBody {
            messages: vec![any(MSG_SEND, send_msg().encode_to_vec())],
            memo: "hello".to_string(),
            timeout_height: 0,
        };
        let raw = TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: vec![],
            signatures: vec![vec![1; 64]],
        };
        let decoded = decode_tx_body(&raw.encode_to_vec()).unwrap();
        assert_eq!(decoded.memo, "hello");
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages[0].type_url, MSG_SEND);
        assert!(decoded.messages[0].data.is_some());
    }

    #[test]
    fn test_decode_tx_body_rejects_garbage() {
        let err = decode_tx_body(&[0xff, 0xff]).unwrap_err();
        assert!(matches!(err, ExplorerError::Decode(_)));
    }
}
