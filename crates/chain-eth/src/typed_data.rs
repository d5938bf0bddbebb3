//! EIP-712 structured data hashing from the JSON form used by
//! `eth_signTypedData_v4`.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use alloy_primitives::{I256, U256};
use serde::Deserialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::address::parse_address;
use crate::error::EthError;

const DOMAIN_TYPE: &str = "EIP712Domain";

#[derive(Debug, Clone, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `{ types, primaryType, domain, message }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub domain: Value,
    #[serde(default)]
    pub message: Value,
}

fn keccak(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn err(msg: impl Into<String>) -> EthError {
    EthError::TypedData(msg.into())
}

impl TypedData {
    pub fn from_json(value: &Value) -> Result<Self, EthError> {
        let mut typed: TypedData =
            serde_json::from_value(value.clone()).map_err(|e| err(e.to_string()))?;
        if !typed.types.contains_key(DOMAIN_TYPE) {
            typed
                .types
                .insert(DOMAIN_TYPE.to_string(), infer_domain_fields(&typed.domain));
        }
        Ok(typed)
    }

    /// `keccak256(0x19 0x01 || domainSeparator || hashStruct(message))`.
    pub fn signing_hash(&self) -> Result<[u8; 32], EthError> {
        let mut buf = vec![0x19, 0x01];
        buf.extend_from_slice(&self.domain_separator()?);
        if self.primary_type != DOMAIN_TYPE {
            buf.extend_from_slice(&self.hash_struct(&self.primary_type, &self.message)?);
        }
        Ok(keccak(&buf))
    }

    pub fn domain_separator(&self) -> Result<[u8; 32], EthError> {
        self.hash_struct(DOMAIN_TYPE, &self.domain)
    }

    pub fn hash_struct(&self, type_name: &str, data: &Value) -> Result<[u8; 32], EthError> {
        Ok(keccak(&self.encode_data(type_name, data)?))
    }

    /// `Primary(fields)` followed by referenced struct types in name order.
    pub fn encode_type(&self, primary: &str) -> Result<String, EthError> {
        let mut deps = BTreeSet::new();
        self.collect_deps(primary, &mut deps)?;
        deps.remove(primary);

        let mut out = self.format_type(primary)?;
        for dep in deps {
            out.push_str(&self.format_type(&dep)?);
        }
        Ok(out)
    }

    pub fn type_hash(&self, type_name: &str) -> Result<[u8; 32], EthError> {
        Ok(keccak(self.encode_type(type_name)?.as_bytes()))
    }

    fn fields(&self, type_name: &str) -> Result<&[TypedField], EthError> {
        self.types
            .get(type_name)
            .map(Vec::as_slice)
            .ok_or_else(|| err(format!("unknown type {type_name}")))
    }

    fn format_type(&self, type_name: &str) -> Result<String, EthError> {
        let fields: Vec<String> = self
            .fields(type_name)?
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect();
        Ok(format!("{type_name}({})", fields.join(",")))
    }

    fn collect_deps(&self, type_name: &str, found: &mut BTreeSet<String>) -> Result<(), EthError> {
        if found.contains(type_name) {
            return Ok(());
        }
        found.insert(type_name.to_string());
        for field in self.fields(type_name)? {
            let base = strip_array(&field.kind);
            if self.types.contains_key(base) {
                self.collect_deps(base, found)?;
            }
        }
        Ok(())
    }

    fn encode_data(&self, type_name: &str, data: &Value) -> Result<Vec<u8>, EthError> {
        let object = data
            .as_object()
            .ok_or_else(|| err(format!("{type_name}: expected an object")))?;
        let mut out = self.type_hash(type_name)?.to_vec();
        for field in self.fields(type_name)? {
            let value = object.get(&field.name).unwrap_or(&Value::Null);
            out.extend_from_slice(&self.encode_field(&field.kind, value)?);
        }
        Ok(out)
    }

    fn encode_field(&self, kind: &str, value: &Value) -> Result<[u8; 32], EthError> {
        if let Some(inner) = array_element(kind) {
            let items = value
                .as_array()
                .ok_or_else(|| err(format!("{kind}: expected an array")))?;
            let mut buf = Vec::with_capacity(items.len() * 32);
            for item in items {
                buf.extend_from_slice(&self.encode_field(inner, item)?);
            }
            return Ok(keccak(&buf));
        }

        if self.types.contains_key(kind) {
            if value.is_null() {
                return Ok([0u8; 32]);
            }
            return self.hash_struct(kind, value);
        }

        match kind {
            "string" => {
                let s = value.as_str().ok_or_else(|| err("string: expected a string"))?;
                Ok(keccak(s.as_bytes()))
            }
            "bytes" => Ok(keccak(&decode_hex_value(value)?)),
            "bool" => {
                let flag = value.as_bool().ok_or_else(|| err("bool: expected a boolean"))?;
                let mut word = [0u8; 32];
                word[31] = u8::from(flag);
                Ok(word)
            }
            "address" => {
                let s = value.as_str().ok_or_else(|| err("address: expected a string"))?;
                let addr = parse_address(s)?;
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(addr.as_slice());
                Ok(word)
            }
            k if k.starts_with("bytes") => {
                let size: usize = k[5..]
                    .parse()
                    .map_err(|_| err(format!("unknown type {k}")))?;
                let bytes = decode_hex_value(value)?;
                if size == 0 || size > 32 || bytes.len() > size {
                    return Err(err(format!("{k}: value has {} bytes", bytes.len())));
                }
                let mut word = [0u8; 32];
                word[..bytes.len()].copy_from_slice(&bytes);
                Ok(word)
            }
            k if k.starts_with("uint") => Ok(parse_uint(value)?.to_be_bytes::<32>()),
            k if k.starts_with("int") => Ok(parse_int(value)?.into_raw().to_be_bytes::<32>()),
            other => Err(err(format!("unknown type {other}"))),
        }
    }
}

fn strip_array(kind: &str) -> &str {
    kind.split('[').next().unwrap_or(kind)
}

fn array_element(kind: &str) -> Option<&str> {
    if kind.ends_with(']') {
        kind.rfind('[').map(|i| &kind[..i])
    } else {
        None
    }
}

fn infer_domain_fields(domain: &Value) -> Vec<TypedField> {
    [
        ("name", "string"),
        ("version", "string"),
        ("chainId", "uint256"),
        ("verifyingContract", "address"),
        ("salt", "bytes32"),
    ]
    .into_iter()
    .filter(|(name, _)| domain.get(name).is_some_and(|v| !v.is_null()))
    .map(|(name, kind)| TypedField {
        name: name.to_string(),
        kind: kind.to_string(),
    })
    .collect()
}

fn decode_hex_value(value: &Value) -> Result<Vec<u8>, EthError> {
    let s = value.as_str().ok_or_else(|| err("expected a hex string"))?;
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| err(format!("invalid hex {s:?}: {e}")))
}

fn parse_uint(value: &Value) -> Result<U256, EthError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| err(format!("uint: {n} is not a non-negative integer"))),
        Value::String(s) => U256::from_str(s).map_err(|e| err(format!("uint {s:?}: {e}"))),
        other => Err(err(format!("uint: unexpected value {other}"))),
    }
}

fn parse_int(value: &Value) -> Result<I256, EthError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            I256::from_dec_str(&n.to_string()).map_err(|e| err(format!("int {n}: {e}")))
        }
        Value::String(s) => {
            let parsed = if s.starts_with("0x") || s.starts_with("-0x") {
                I256::from_hex_str(s)
            } else {
                I256::from_dec_str(s)
            };
            parsed.map_err(|e| err(format!("int {s:?}: {e}")))
        }
        other => Err(err(format!("int: unexpected value {other}"))),
    }
}

/// Convenience: signing hash straight from JSON.
pub fn hash_typed_data(value: &Value) -> Result<[u8; 32], EthError> {
    TypedData::from_json(value)?.signing_hash()
}
