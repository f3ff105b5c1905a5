//! EIP-712 typed structured data encoding.
//!
//! Everything here is explicit byte concatenation over `keccak256`:
//!
//! ```text
//! encodeType(S)   = S(t1 n1,...,tk nk) ++ sorted(referenced struct types)
//! hashStruct(S,v) = keccak256(keccak256(encodeType(S)) ++ encodeData(S,v))
//! digest          = keccak256(0x19 ++ 0x01 ++ domainSeparator ++ hashStruct(primary,message))
//! ```
//!
//! Messages are carried as JSON values so that the persisted payload is the
//! same document a wallet would receive from `eth_signTypedData_v4`.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use super::domain::{Eip712Domain, EIP712_DOMAIN_TYPE};
use crate::{Error, Result};

/// A single `(name, type)` member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl Eip712Field {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// Struct name to ordered member list.
///
/// Member order is part of the encoding: the same members declared in a
/// different order produce a different type hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Types(BTreeMap<String, Vec<Eip712Field>>);

impl Types {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a struct definition.
    pub fn with_struct(mut self, name: impl Into<String>, fields: Vec<Eip712Field>) -> Self {
        self.insert(name, fields);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Vec<Eip712Field>) {
        self.0.insert(name.into(), fields);
    }

    pub fn fields(&self, name: &str) -> Option<&[Eip712Field]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A complete typed-data payload: domain, schema and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub types: Types,
    pub message: Value,
}

impl TypedData {
    pub fn new(domain: Eip712Domain, types: Types, message: Value) -> Self {
        Self {
            domain,
            types,
            message,
        }
    }

    /// Domain separator for this payload.
    ///
    /// When the schema declares `EIP712Domain` the domain is hashed under
    /// that declaration; otherwise the canonical five-field domain is used.
    pub fn domain_separator(&self) -> Result<B256> {
        if self.types.contains(EIP712_DOMAIN_TYPE) {
            let domain = serde_json::to_value(&self.domain)?;
            hash_struct(EIP712_DOMAIN_TYPE, &self.types, &domain)
        } else {
            Ok(self.domain.separator())
        }
    }

    /// `hashStruct` of the message under `primary_type`.
    pub fn struct_hash(&self, primary_type: &str) -> Result<B256> {
        hash_struct(primary_type, &self.types, &self.message)
    }

    /// The final 32-byte signing digest.
    pub fn digest(&self, primary_type: &str) -> Result<B256> {
        let domain_separator = self.domain_separator()?;
        let struct_hash = self.struct_hash(primary_type)?;
        Ok(typed_data_hash(domain_separator, struct_hash))
    }
}

/// Compute the EIP-712 typed data hash: `keccak256(0x1901 ++ separator ++ struct_hash)`.
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut data = [0u8; 66];
    data[0] = 0x19;
    data[1] = 0x01;
    data[2..34].copy_from_slice(domain_separator.as_slice());
    data[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(data)
}

/// Canonical type string for `primary_type`, with referenced struct types
/// appended in name order.
pub fn encode_type(primary_type: &str, types: &Types) -> Result<String> {
    let fields = types
        .fields(primary_type)
        .ok_or_else(|| Error::encoding(format!("unknown struct type `{primary_type}`")))?;

    let mut dependencies = BTreeSet::new();
    collect_dependencies(primary_type, types, &mut dependencies);
    dependencies.remove(primary_type);

    let mut encoded = struct_signature(primary_type, fields);
    for dependency in dependencies {
        if let Some(fields) = types.fields(dependency) {
            encoded.push_str(&struct_signature(dependency, fields));
        }
    }

    Ok(encoded)
}

/// `keccak256(encodeType(primary_type))`.
pub fn type_hash(primary_type: &str, types: &Types) -> Result<B256> {
    Ok(keccak256(encode_type(primary_type, types)?.as_bytes()))
}

/// `keccak256(typeHash ++ encodeData)` for a struct value.
pub fn hash_struct(primary_type: &str, types: &Types, value: &Value) -> Result<B256> {
    Ok(keccak256(encode_data(primary_type, types, value)?))
}

/// Type hash followed by each member's 32-byte encoding, in declared order.
pub fn encode_data(primary_type: &str, types: &Types, value: &Value) -> Result<Vec<u8>> {
    let fields = types
        .fields(primary_type)
        .ok_or_else(|| Error::encoding(format!("unknown struct type `{primary_type}`")))?;
    let object = value.as_object().ok_or_else(|| {
        Error::encoding(format!("`{primary_type}` value must be a JSON object"))
    })?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(type_hash(primary_type, types)?.as_slice());

    for field in fields {
        let member = object.get(&field.name).ok_or_else(|| {
            Error::encoding(format!("`{primary_type}.{}` is missing", field.name))
        })?;
        let word = encode_value(&field.field_type, member, types).map_err(|e| match e {
            Error::Encoding { message } => {
                Error::encoding(format!("`{primary_type}.{}`: {message}", field.name))
            }
            other => other,
        })?;
        encoded.extend_from_slice(word.as_slice());
    }

    Ok(encoded)
}

/// Encode one value of `field_type` into its 32-byte EIP-712 word.
pub fn encode_value(field_type: &str, value: &Value, types: &Types) -> Result<B256> {
    if let Some((element_type, length)) = split_array(field_type)? {
        let items = value
            .as_array()
            .ok_or_else(|| Error::encoding(format!("expected array for `{field_type}`")))?;
        if let Some(length) = length {
            if items.len() != length {
                return Err(Error::encoding(format!(
                    "`{field_type}` expects {length} elements, got {}",
                    items.len()
                )));
            }
        }

        let mut concatenated = Vec::with_capacity(32 * items.len());
        for item in items {
            concatenated.extend_from_slice(encode_value(element_type, item, types)?.as_slice());
        }
        return Ok(keccak256(&concatenated));
    }

    if types.contains(field_type) {
        return hash_struct(field_type, types, value);
    }

    match field_type {
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| Error::encoding(format!("expected string, got {value}")))?;
            Ok(keccak256(s.as_bytes()))
        }
        "bytes" => Ok(keccak256(decode_hex_value(value)?)),
        "address" => Ok(B256::left_padding_from(parse_address(value)?.as_slice())),
        "bool" => match value {
            Value::Bool(b) => Ok(B256::with_last_byte(u8::from(*b))),
            other => Err(Error::encoding(format!("expected bool, got {other}"))),
        },
        t if t.starts_with("uint") => {
            let bits = parse_bits(t, &t[4..])?;
            let number = parse_uint(value)?;
            if number.bit_len() > bits {
                return Err(Error::encoding(format!("{number} overflows {t}")));
            }
            Ok(B256::from(number.to_be_bytes::<32>()))
        }
        t if t.starts_with("int") => {
            let bits = parse_bits(t, &t[3..])?;
            encode_int(t, bits, value)
        }
        t if t.starts_with("bytes") => {
            let size: usize = t[5..]
                .parse()
                .map_err(|_| Error::encoding(format!("unknown type `{t}`")))?;
            if !(1..=32).contains(&size) {
                return Err(Error::encoding(format!("invalid fixed bytes type `{t}`")));
            }
            let bytes = decode_hex_value(value)?;
            if bytes.len() != size {
                return Err(Error::encoding(format!(
                    "`{t}` expects {size} bytes, got {}",
                    bytes.len()
                )));
            }
            Ok(B256::right_padding_from(&bytes))
        }
        other => Err(Error::encoding(format!("unknown type `{other}`"))),
    }
}

fn struct_signature(name: &str, fields: &[Eip712Field]) -> String {
    let members: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.field_type, f.name))
        .collect();
    format!("{}({})", name, members.join(","))
}

fn collect_dependencies<'a>(name: &'a str, types: &'a Types, found: &mut BTreeSet<&'a str>) {
    let Some(fields) = types.fields(name) else {
        return;
    };
    for field in fields {
        let base = base_type(&field.field_type);
        if types.contains(base) && found.insert(base) {
            collect_dependencies(base, types, found);
        }
    }
}

/// Strip every array suffix: `Person[][2]` -> `Person`.
fn base_type(field_type: &str) -> &str {
    field_type.split('[').next().unwrap_or(field_type)
}

/// Split the outermost array dimension: `uint256[][3]` -> (`uint256[]`, Some(3)).
fn split_array(field_type: &str) -> Result<Option<(&str, Option<usize>)>> {
    if !field_type.ends_with(']') {
        return Ok(None);
    }
    let open = field_type
        .rfind('[')
        .ok_or_else(|| Error::encoding(format!("malformed array type `{field_type}`")))?;
    let element_type = &field_type[..open];
    let length = &field_type[open + 1..field_type.len() - 1];
    if element_type.is_empty() {
        return Err(Error::encoding(format!("malformed array type `{field_type}`")));
    }

    if length.is_empty() {
        Ok(Some((element_type, None)))
    } else {
        let length = length
            .parse()
            .map_err(|_| Error::encoding(format!("malformed array type `{field_type}`")))?;
        Ok(Some((element_type, Some(length))))
    }
}

fn parse_bits(field_type: &str, suffix: &str) -> Result<usize> {
    if suffix.is_empty() {
        return Ok(256);
    }
    let bits: usize = suffix
        .parse()
        .map_err(|_| Error::encoding(format!("unknown type `{field_type}`")))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(Error::encoding(format!("invalid integer width in `{field_type}`")));
    }
    Ok(bits)
}

fn parse_uint(value: &Value) -> Result<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Error::encoding(format!("expected unsigned integer, got {n}"))),
        Value::String(s) => parse_uint_str(s),
        other => Err(Error::encoding(format!("expected unsigned integer, got {other}"))),
    }
}

fn parse_uint_str(s: &str) -> Result<U256> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| Error::encoding(format!("expected unsigned integer, got \"{s}\"")))
}

fn encode_int(field_type: &str, bits: usize, value: &Value) -> Result<B256> {
    let (negative, magnitude) = match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => (i < 0, U256::from(i.unsigned_abs())),
            (None, Some(u)) => (false, U256::from(u)),
            _ => return Err(Error::encoding(format!("expected integer, got {n}"))),
        },
        Value::String(s) => match s.trim().strip_prefix('-') {
            Some(rest) => (true, parse_uint_str(rest)?),
            None => (false, parse_uint_str(s)?),
        },
        other => return Err(Error::encoding(format!("expected integer, got {other}"))),
    };

    let limit = U256::from(1u8) << (bits - 1);
    let in_range = if negative {
        magnitude <= limit
    } else {
        magnitude < limit
    };
    if !in_range {
        return Err(Error::encoding(format!("value out of range for {field_type}")));
    }

    let word = if negative {
        U256::ZERO.wrapping_sub(magnitude)
    } else {
        magnitude
    };
    Ok(B256::from(word.to_be_bytes::<32>()))
}

fn parse_address(value: &Value) -> Result<Address> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::encoding(format!("expected address string, got {value}")))?;
    Address::from_str(s.trim()).map_err(|_| Error::encoding(format!("invalid address \"{s}\"")))
}

fn decode_hex_value(value: &Value) -> Result<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::encoding(format!("expected hex string, got {value}")))?;
    hex::decode(s.trim().trim_start_matches("0x"))
        .map_err(|e| Error::encoding(format!("invalid hex \"{s}\": {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mail_types() -> Types {
        Types::new()
            .with_struct(
                "EIP712Domain",
                vec![
                    Eip712Field::new("name", "string"),
                    Eip712Field::new("version", "string"),
                    Eip712Field::new("chainId", "uint256"),
                    Eip712Field::new("verifyingContract", "address"),
                ],
            )
            .with_struct(
                "Person",
                vec![
                    Eip712Field::new("name", "string"),
                    Eip712Field::new("wallet", "address"),
                ],
            )
            .with_struct(
                "Mail",
                vec![
                    Eip712Field::new("from", "Person"),
                    Eip712Field::new("to", "Person"),
                    Eip712Field::new("contents", "string"),
                ],
            )
    }

    fn mail_message() -> Value {
        json!({
            "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
            "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
            "contents": "Hello, Bob!"
        })
    }

    #[test]
    fn test_encode_type_appends_referenced_structs() {
        let encoded = encode_type("Mail", &mail_types()).unwrap();
        assert_eq!(
            encoded,
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
    }

    #[test]
    fn test_referenced_structs_sorted_by_name() {
        let types = Types::new()
            .with_struct("Zeta", vec![Eip712Field::new("a", "Alpha")])
            .with_struct("Alpha", vec![Eip712Field::new("b", "Beta[]")])
            .with_struct("Beta", vec![Eip712Field::new("c", "uint8")])
            .with_struct(
                "Root",
                vec![
                    Eip712Field::new("z", "Zeta"),
                    Eip712Field::new("b", "Beta"),
                ],
            );

        assert_eq!(
            encode_type("Root", &types).unwrap(),
            "Root(Zeta z,Beta b)Alpha(Beta[] b)Beta(uint8 c)Zeta(Alpha a)"
        );
    }

    #[test]
    fn test_mail_vector_digest() {
        // Reference vector from the EIP-712 specification.
        let data = TypedData::new(
            Eip712Domain::custom(
                "Ether Mail",
                "1",
                1,
                "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC".parse().unwrap(),
                B256::ZERO,
            ),
            mail_types(),
            mail_message(),
        );

        assert_eq!(
            data.domain_separator().unwrap(),
            "0xf2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
                .parse::<B256>()
                .unwrap()
        );
        assert_eq!(
            data.digest("Mail").unwrap(),
            "0xbe609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
                .parse::<B256>()
                .unwrap()
        );
    }

    #[test]
    fn test_typed_data_hash_prefix() {
        let separator = B256::repeat_byte(0xaa);
        let struct_hash = B256::repeat_byte(0xbb);

        let mut expected = vec![0x19, 0x01];
        expected.extend_from_slice(separator.as_slice());
        expected.extend_from_slice(struct_hash.as_slice());

        assert_eq!(typed_data_hash(separator, struct_hash), keccak256(&expected));
    }

    #[test]
    fn test_field_order_changes_type_hash() {
        let ordered = Types::new().with_struct(
            "Pair",
            vec![Eip712Field::new("a", "uint256"), Eip712Field::new("b", "uint256")],
        );
        let swapped = Types::new().with_struct(
            "Pair",
            vec![Eip712Field::new("b", "uint256"), Eip712Field::new("a", "uint256")],
        );
        let value = json!({ "a": 1, "b": 2 });

        assert_ne!(type_hash("Pair", &ordered).unwrap(), type_hash("Pair", &swapped).unwrap());
        assert_ne!(
            hash_struct("Pair", &ordered, &value).unwrap(),
            hash_struct("Pair", &swapped, &value).unwrap()
        );
    }

    #[test]
    fn test_atomic_encodings() {
        let types = Types::new();

        assert_eq!(
            encode_value("uint256", &json!(42161), &types).unwrap(),
            B256::from(U256::from(42161u64).to_be_bytes::<32>())
        );
        assert_eq!(
            encode_value("uint256", &json!("42161"), &types).unwrap(),
            encode_value("uint256", &json!("0xa4b1"), &types).unwrap()
        );
        assert_eq!(
            encode_value("address", &json!("0x00000000000000000000000000000000000000ff"), &types)
                .unwrap(),
            B256::with_last_byte(0xff)
        );
        assert_eq!(
            encode_value("bool", &json!(true), &types).unwrap(),
            B256::with_last_byte(1)
        );
        assert_eq!(
            encode_value("string", &json!("turbox"), &types).unwrap(),
            keccak256(b"turbox")
        );
        assert_eq!(
            encode_value("bytes", &json!("0xdeadbeef"), &types).unwrap(),
            keccak256([0xde, 0xad, 0xbe, 0xef])
        );

        let mut padded = [0u8; 32];
        padded[0] = 0xab;
        padded[1] = 0xcd;
        assert_eq!(
            encode_value("bytes2", &json!("0xabcd"), &types).unwrap(),
            B256::from(padded)
        );
    }

    #[test]
    fn test_signed_integers_use_twos_complement() {
        let types = Types::new();
        assert_eq!(
            encode_value("int256", &json!(-1), &types).unwrap(),
            B256::repeat_byte(0xff)
        );
        assert_eq!(
            encode_value("int8", &json!("-128"), &types).unwrap(),
            encode_value("int256", &json!(-128), &types).unwrap()
        );
        assert!(encode_value("int8", &json!(128), &types).is_err());
        assert!(encode_value("int8", &json!(-129), &types).is_err());
    }

    #[test]
    fn test_arrays_hash_concatenated_elements() {
        let types = Types::new();
        let encoded = encode_value("uint8[]", &json!([1, 2]), &types).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(B256::with_last_byte(1).as_slice());
        expected.extend_from_slice(B256::with_last_byte(2).as_slice());
        assert_eq!(encoded, keccak256(&expected));

        assert!(encode_value("uint8[3]", &json!([1, 2]), &types).is_err());
    }

    #[test]
    fn test_type_mismatches_are_rejected() {
        let types = Types::new();
        assert!(matches!(
            encode_value("uint256", &json!("tomorrow"), &types),
            Err(Error::Encoding { .. })
        ));
        assert!(encode_value("uint256", &json!(-5), &types).is_err());
        assert!(encode_value("uint256", &json!(1.5), &types).is_err());
        assert!(encode_value("uint8", &json!(256), &types).is_err());
        assert!(encode_value("address", &json!("0x1234"), &types).is_err());
        assert!(encode_value("string", &json!(7), &types).is_err());
        assert!(encode_value("bytes32", &json!("0x00"), &types).is_err());
        assert!(encode_value("float", &json!(1), &types).is_err());
        assert!(encode_value("uint7", &json!(1), &types).is_err());
    }

    #[test]
    fn test_missing_field_names_struct_and_member() {
        let types = mail_types();
        let err = hash_struct("Mail", &types, &json!({ "contents": "hi" })).unwrap_err();
        assert!(err.to_string().contains("Mail.from"));
    }

    #[test]
    fn test_unknown_primary_type() {
        assert!(encode_type("Nope", &mail_types()).is_err());
    }

    #[test]
    fn test_types_serialize_as_eip712_json() {
        let types = Types::new().with_struct("Person", vec![Eip712Field::new("name", "string")]);
        assert_eq!(
            serde_json::to_value(&types).unwrap(),
            json!({ "Person": [{ "name": "name", "type": "string" }] })
        );
    }
}
