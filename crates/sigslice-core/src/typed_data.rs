//! Schema-driven canonicalization and digesting of structured-data messages.
//!
//! A [`TypedMessage`] is an EIP-712-style typed document: a type schema, a
//! primary type, a domain descriptor, and a field/value document. At
//! construction it is validated, coerced against the schema, and reduced to
//! two deterministic artifacts:
//!
//! - its **canonical JSON** (compact, key order fixed by the schema), the
//!   exact bytes that get concatenated and signed; and
//! - its **digest**, the EIP-712 signing hash
//!   `keccak256(0x1901 ∥ domainSeparator ∥ hashStruct(primaryType, message))`.
//!
//! Two independently performed canonicalizations of the same logical
//! content are byte-identical. The whole attestation protocol rests on
//! that invariant: the attestation engine re-canonicalizes a slice of the
//! signed buffer and compares byte-for-byte.
//!
//! Field types form a closed variant tree ([`FieldType`]) walked
//! recursively by both the canonicalizer and the digester; there is no
//! dynamic dispatch on type names.

use alloy_primitives::{keccak256, Address, B256, I256, U256};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{CoreError, Result};

// =============================================================================
// Field types
// =============================================================================

/// Closed set of field types supported by the canonicalizer and digester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Address,
    Bool,
    String,
    /// Dynamic byte string (`bytes`).
    Bytes,
    /// Unsigned integer with the given bit width (8..=256, multiple of 8).
    Uint(usize),
    /// Signed integer with the given bit width (8..=256, multiple of 8).
    Int(usize),
    /// Fixed byte string `bytesN`, 1..=32 bytes.
    FixedBytes(usize),
    /// Dynamic array `T[]`.
    Array(Box<FieldType>),
    /// Fixed-size array `T[n]`.
    FixedArray(Box<FieldType>, usize),
    /// Reference to a struct type declared in the schema.
    Struct(String),
}

impl FieldType {
    /// Parse a Solidity-style type string (`"uint256"`, `"bytes32"`,
    /// `"Person[]"`, `"uint8[4]"`, ...).
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(open) = s.rfind('[') {
            let Some(inner) = s.strip_suffix(']') else {
                return Err(CoreError::Schema(format!("malformed array type `{s}`")));
            };
            let elem = Self::parse(&inner[..open])?;
            let len_str = &inner[open + 1..];
            if len_str.is_empty() {
                return Ok(FieldType::Array(Box::new(elem)));
            }
            let len: usize = len_str
                .parse()
                .map_err(|_| CoreError::Schema(format!("invalid array length in `{s}`")))?;
            return Ok(FieldType::FixedArray(Box::new(elem), len));
        }

        match s {
            "address" => return Ok(FieldType::Address),
            "bool" => return Ok(FieldType::Bool),
            "string" => return Ok(FieldType::String),
            "bytes" => return Ok(FieldType::Bytes),
            "uint" => return Ok(FieldType::Uint(256)),
            "int" => return Ok(FieldType::Int(256)),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("uint") {
            if rest.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(FieldType::Uint(parse_bit_width(s, rest)?));
            }
        }
        if let Some(rest) = s.strip_prefix("int") {
            if rest.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(FieldType::Int(parse_bit_width(s, rest)?));
            }
        }
        if let Some(rest) = s.strip_prefix("bytes") {
            if rest.bytes().all(|b| b.is_ascii_digit()) {
                let n: usize = rest
                    .parse()
                    .map_err(|_| CoreError::Schema(format!("invalid byte width in `{s}`")))?;
                if n == 0 || n > 32 {
                    return Err(CoreError::Schema(format!(
                        "fixed bytes width must be 1..=32, got `{s}`"
                    )));
                }
                return Ok(FieldType::FixedBytes(n));
            }
        }

        if is_valid_identifier(s) {
            return Ok(FieldType::Struct(s.to_string()));
        }
        Err(CoreError::Schema(format!("unsupported field type `{s}`")))
    }

    /// The base type under any array nesting.
    fn base(&self) -> &FieldType {
        match self {
            FieldType::Array(inner) | FieldType::FixedArray(inner, _) => inner.base(),
            other => other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Address => f.write_str("address"),
            FieldType::Bool => f.write_str("bool"),
            FieldType::String => f.write_str("string"),
            FieldType::Bytes => f.write_str("bytes"),
            FieldType::Uint(bits) => write!(f, "uint{bits}"),
            FieldType::Int(bits) => write!(f, "int{bits}"),
            FieldType::FixedBytes(n) => write!(f, "bytes{n}"),
            FieldType::Array(inner) => write!(f, "{inner}[]"),
            FieldType::FixedArray(inner, n) => write!(f, "{inner}[{n}]"),
            FieldType::Struct(name) => f.write_str(name),
        }
    }
}

fn parse_bit_width(full: &str, digits: &str) -> Result<usize> {
    let bits: usize = digits
        .parse()
        .map_err(|_| CoreError::Schema(format!("invalid bit width in `{full}`")))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(CoreError::Schema(format!(
            "bit width must be a multiple of 8 in 8..=256, got `{full}`"
        )));
    }
    Ok(bits)
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Schema
// =============================================================================

/// One named, typed field of a struct type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldType,
}

impl FieldDef {
    /// Build a field definition from a name and a type string.
    pub fn new(name: impl Into<String>, type_str: &str) -> Result<Self> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(CoreError::Schema(format!("invalid field name `{name}`")));
        }
        Ok(Self {
            name,
            kind: FieldType::parse(type_str)?,
        })
    }
}

/// Ordered field declarations per struct type.
///
/// Field order within a struct is semantic (it fixes both the canonical
/// JSON key order and the EIP-712 `encodeType` string); the order in which
/// structs are declared is not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeSchema {
    defs: BTreeMap<String, Vec<FieldDef>>,
}

impl TypeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a struct type. The `EIP712Domain` type is derived from the
    /// domain descriptor and cannot be declared by hand.
    pub fn define(&mut self, name: impl Into<String>, fields: Vec<FieldDef>) -> Result<()> {
        let name = name.into();
        if name == DOMAIN_TYPE_NAME {
            return Err(CoreError::Schema(format!("`{DOMAIN_TYPE_NAME}` is reserved")));
        }
        if !is_valid_identifier(&name) {
            return Err(CoreError::Schema(format!("invalid struct name `{name}`")));
        }
        if self.defs.contains_key(&name) {
            return Err(CoreError::Schema(format!("duplicate struct type `{name}`")));
        }
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::Schema(format!(
                    "duplicate field `{}` in struct `{name}`",
                    field.name
                )));
            }
        }
        self.defs.insert(name, fields);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[FieldDef]> {
        self.defs.get(name).map(Vec::as_slice)
    }

    /// Struct names in canonical (lexicographic) order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    /// Check every struct reference resolves to a declared type.
    fn validate(&self) -> Result<()> {
        for (name, fields) in &self.defs {
            for field in fields {
                if let FieldType::Struct(referenced) = field.kind.base() {
                    if !self.defs.contains_key(referenced) {
                        return Err(CoreError::Schema(format!(
                            "struct `{name}` field `{}` references undeclared type `{referenced}`",
                            field.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// EIP-712 `encodeType`: the primary type's declaration followed by
    /// every transitively referenced struct type, sorted by name.
    fn encode_type(&self, primary: &str) -> Result<String> {
        let mut referenced = BTreeSet::new();
        self.collect_references(primary, &mut referenced)?;
        referenced.remove(primary);

        let mut out = self.type_declaration(primary)?;
        for name in referenced {
            out.push_str(&self.type_declaration(&name)?);
        }
        Ok(out)
    }

    fn collect_references(&self, name: &str, out: &mut BTreeSet<String>) -> Result<()> {
        if !out.insert(name.to_string()) {
            return Ok(());
        }
        let fields = self
            .get(name)
            .ok_or_else(|| CoreError::Schema(format!("undeclared struct type `{name}`")))?;
        for field in fields {
            if let FieldType::Struct(referenced) = field.kind.base() {
                self.collect_references(referenced, out)?;
            }
        }
        Ok(())
    }

    fn type_declaration(&self, name: &str) -> Result<String> {
        let fields = self
            .get(name)
            .ok_or_else(|| CoreError::Schema(format!("undeclared struct type `{name}`")))?;
        let inner = fields
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!("{name}({inner})"))
    }
}

// =============================================================================
// Domain
// =============================================================================

const DOMAIN_TYPE_NAME: &str = "EIP712Domain";

/// EIP-712 domain descriptor; every field optional per domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<U256>,
    pub verifying_contract: Option<Address>,
    pub salt: Option<B256>,
}

impl Eip712Domain {
    /// Field definitions derived from the present fields, in the fixed
    /// EIP-712 order.
    fn field_defs(&self) -> Vec<(&'static str, &'static str)> {
        let mut defs = Vec::new();
        if self.name.is_some() {
            defs.push(("name", "string"));
        }
        if self.version.is_some() {
            defs.push(("version", "string"));
        }
        if self.chain_id.is_some() {
            defs.push(("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            defs.push(("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            defs.push(("salt", "bytes32"));
        }
        defs
    }

    /// `hashStruct(EIP712Domain)` over the present fields.
    pub fn separator(&self) -> B256 {
        let type_str = format!(
            "{DOMAIN_TYPE_NAME}({})",
            self.field_defs()
                .iter()
                .map(|(name, kind)| format!("{kind} {name}"))
                .collect::<Vec<_>>()
                .join(",")
        );
        let mut preimage = Vec::with_capacity(32 * 6);
        preimage.extend_from_slice(keccak256(type_str.as_bytes()).as_slice());
        if let Some(name) = &self.name {
            preimage.extend_from_slice(keccak256(name.as_bytes()).as_slice());
        }
        if let Some(version) = &self.version {
            preimage.extend_from_slice(keccak256(version.as_bytes()).as_slice());
        }
        if let Some(chain_id) = &self.chain_id {
            preimage.extend_from_slice(&chain_id.to_be_bytes::<32>());
        }
        if let Some(contract) = &self.verifying_contract {
            preimage.extend_from_slice(B256::left_padding_from(contract.as_slice()).as_slice());
        }
        if let Some(salt) = &self.salt {
            preimage.extend_from_slice(salt.as_slice());
        }
        keccak256(&preimage)
    }

    /// Canonical JSON object, keys in fixed EIP-712 order.
    fn to_canonical_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(version) = &self.version {
            map.insert("version".into(), Value::String(version.clone()));
        }
        if let Some(chain_id) = &self.chain_id {
            map.insert("chainId".into(), canonical_uint_value(chain_id));
        }
        if let Some(contract) = &self.verifying_contract {
            map.insert(
                "verifyingContract".into(),
                Value::String(format!("0x{}", hex::encode(contract))),
            );
        }
        if let Some(salt) = &self.salt {
            map.insert("salt".into(), Value::String(format!("0x{}", hex::encode(salt))));
        }
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(CoreError::Canonicalization(
                "domain must be a JSON object".into(),
            ));
        };
        let mut domain = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "name" => domain.name = Some(expect_string(value, "domain.name")?),
                "version" => domain.version = Some(expect_string(value, "domain.version")?),
                "chainId" => domain.chain_id = Some(coerce_uint(value, 256, "domain.chainId")?),
                "verifyingContract" => {
                    domain.verifying_contract =
                        Some(coerce_address(value, "domain.verifyingContract")?)
                }
                "salt" => {
                    let bytes = coerce_fixed_bytes(value, 32, "domain.salt")?;
                    domain.salt = Some(B256::from_slice(&bytes));
                }
                other => {
                    return Err(CoreError::Canonicalization(format!(
                        "unknown domain field `{other}`"
                    )))
                }
            }
        }
        Ok(domain)
    }
}

// =============================================================================
// Coerced values
// =============================================================================

/// A document value coerced against its declared [`FieldType`]. Both the
/// canonical JSON writer and the digester walk this tree.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TypedValue {
    Address(Address),
    Bool(bool),
    Str(String),
    DynBytes(Vec<u8>),
    Uint(U256),
    Int(I256),
    FixedBytes(Vec<u8>),
    Array(Vec<TypedValue>),
    Struct(String, Vec<(String, TypedValue)>),
}

fn coerce(schema: &TypeSchema, kind: &FieldType, value: &Value, path: &str) -> Result<TypedValue> {
    match kind {
        FieldType::Address => Ok(TypedValue::Address(coerce_address(value, path)?)),
        FieldType::Bool => match value {
            Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            _ => Err(type_mismatch(path, "bool", value)),
        },
        FieldType::String => Ok(TypedValue::Str(expect_string(value, path)?)),
        FieldType::Bytes => Ok(TypedValue::DynBytes(coerce_hex_bytes(value, path)?)),
        FieldType::FixedBytes(n) => Ok(TypedValue::FixedBytes(coerce_fixed_bytes(
            value, *n, path,
        )?)),
        FieldType::Uint(bits) => Ok(TypedValue::Uint(coerce_uint(value, *bits, path)?)),
        FieldType::Int(bits) => Ok(TypedValue::Int(coerce_int(value, *bits, path)?)),
        FieldType::Array(inner) => coerce_array(schema, inner, value, None, path),
        FieldType::FixedArray(inner, len) => coerce_array(schema, inner, value, Some(*len), path),
        FieldType::Struct(name) => match value {
            Value::Object(map) => Ok(TypedValue::Struct(
                name.clone(),
                coerce_struct(schema, name, map, path)?,
            )),
            _ => Err(type_mismatch(path, name, value)),
        },
    }
}

fn coerce_array(
    schema: &TypeSchema,
    inner: &FieldType,
    value: &Value,
    expected_len: Option<usize>,
    path: &str,
) -> Result<TypedValue> {
    let Value::Array(items) = value else {
        return Err(type_mismatch(path, "array", value));
    };
    if let Some(len) = expected_len {
        if items.len() != len {
            return Err(CoreError::Canonicalization(format!(
                "`{path}`: expected {len} elements, got {}",
                items.len()
            )));
        }
    }
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        out.push(coerce(schema, inner, item, &format!("{path}[{i}]"))?);
    }
    Ok(TypedValue::Array(out))
}

fn coerce_struct(
    schema: &TypeSchema,
    name: &str,
    map: &Map<String, Value>,
    path: &str,
) -> Result<Vec<(String, TypedValue)>> {
    let fields = schema
        .get(name)
        .ok_or_else(|| CoreError::Schema(format!("undeclared struct type `{name}`")))?;

    // Reject unknown keys instead of silently dropping them.
    for key in map.keys() {
        if !fields.iter().any(|f| f.name == *key) {
            return Err(CoreError::Canonicalization(format!(
                "`{path}`: field `{key}` is not declared on `{name}`"
            )));
        }
    }

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let value = map.get(&field.name).ok_or_else(|| {
            CoreError::Canonicalization(format!("`{path}`: missing field `{}`", field.name))
        })?;
        let child_path = format!("{path}.{}", field.name);
        out.push((
            field.name.clone(),
            coerce(schema, &field.kind, value, &child_path)?,
        ));
    }
    Ok(out)
}

fn type_mismatch(path: &str, expected: &str, got: &Value) -> CoreError {
    CoreError::Canonicalization(format!("`{path}`: expected {expected}, got `{got}`"))
}

fn expect_string(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(type_mismatch(path, "string", value)),
    }
}

fn coerce_address(value: &Value, path: &str) -> Result<Address> {
    let Value::String(s) = value else {
        return Err(type_mismatch(path, "address", value));
    };
    s.parse::<Address>()
        .map_err(|e| CoreError::Canonicalization(format!("`{path}`: invalid address: {e}")))
}

fn coerce_hex_bytes(value: &Value, path: &str) -> Result<Vec<u8>> {
    let Value::String(s) = value else {
        return Err(type_mismatch(path, "0x-prefixed hex string", value));
    };
    let stripped = s
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::Canonicalization(format!("`{path}`: missing 0x prefix")))?;
    hex::decode(stripped)
        .map_err(|e| CoreError::Canonicalization(format!("`{path}`: invalid hex: {e}")))
}

fn coerce_fixed_bytes(value: &Value, n: usize, path: &str) -> Result<Vec<u8>> {
    let bytes = coerce_hex_bytes(value, path)?;
    if bytes.len() != n {
        return Err(CoreError::Canonicalization(format!(
            "`{path}`: expected {n} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn coerce_uint(value: &Value, bits: usize, path: &str) -> Result<U256> {
    let parsed = match value {
        Value::Number(n) => {
            let v = n
                .as_u64()
                .ok_or_else(|| type_mismatch(path, "unsigned integer", value))?;
            U256::from(v)
        }
        Value::String(s) => s
            .parse::<U256>()
            .map_err(|e| CoreError::Canonicalization(format!("`{path}`: invalid uint: {e}")))?,
        _ => return Err(type_mismatch(path, "unsigned integer", value)),
    };
    if bits < 256 && parsed > (U256::MAX >> (256 - bits)) {
        return Err(CoreError::Canonicalization(format!(
            "`{path}`: value does not fit in uint{bits}"
        )));
    }
    Ok(parsed)
}

fn coerce_int(value: &Value, bits: usize, path: &str) -> Result<I256> {
    let parsed = match value {
        Value::Number(n) => {
            let v = n
                .as_i64()
                .ok_or_else(|| type_mismatch(path, "signed integer", value))?;
            I256::try_from(v)
                .map_err(|e| CoreError::Canonicalization(format!("`{path}`: invalid int: {e}")))?
        }
        Value::String(s) => s
            .parse::<I256>()
            .map_err(|e| CoreError::Canonicalization(format!("`{path}`: invalid int: {e}")))?,
        _ => return Err(type_mismatch(path, "signed integer", value)),
    };
    if bits < 256 {
        let in_range = if parsed.is_negative() {
            parsed
                .checked_neg()
                .is_some_and(|magnitude| magnitude.into_raw() <= (U256::ONE << (bits - 1)))
        } else {
            parsed.into_raw() <= (U256::MAX >> (257 - bits))
        };
        if !in_range {
            return Err(CoreError::Canonicalization(format!(
                "`{path}`: value does not fit in int{bits}"
            )));
        }
    }
    Ok(parsed)
}

// =============================================================================
// Canonical JSON rendering
// =============================================================================

/// Canonical rendering for unsigned integers: a JSON number when the value
/// fits in `u64`, a decimal string otherwise.
fn canonical_uint_value(v: &U256) -> Value {
    if *v <= U256::from(u64::MAX) {
        Value::from(v.to::<u64>())
    } else {
        Value::String(v.to_string())
    }
}

fn canonical_int_value(v: &I256) -> Value {
    match i64::try_from(*v) {
        Ok(small) => Value::from(small),
        Err(_) => Value::String(v.to_string()),
    }
}

fn canonical_value(tv: &TypedValue) -> Value {
    match tv {
        TypedValue::Address(a) => Value::String(format!("0x{}", hex::encode(a))),
        TypedValue::Bool(b) => Value::Bool(*b),
        TypedValue::Str(s) => Value::String(s.clone()),
        TypedValue::DynBytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        TypedValue::FixedBytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        TypedValue::Uint(v) => canonical_uint_value(v),
        TypedValue::Int(v) => canonical_int_value(v),
        TypedValue::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        TypedValue::Struct(_, fields) => {
            let mut map = Map::new();
            for (name, value) in fields {
                map.insert(name.clone(), canonical_value(value));
            }
            Value::Object(map)
        }
    }
}

// =============================================================================
// Digesting
// =============================================================================

/// Encode a coerced value as its 32-byte EIP-712 `encodeData` word.
fn encode_word(schema: &TypeSchema, tv: &TypedValue) -> Result<B256> {
    Ok(match tv {
        TypedValue::Address(a) => B256::left_padding_from(a.as_slice()),
        TypedValue::Bool(b) => B256::with_last_byte(*b as u8),
        TypedValue::Str(s) => keccak256(s.as_bytes()),
        TypedValue::DynBytes(b) => keccak256(b),
        TypedValue::FixedBytes(b) => {
            let mut word = [0u8; 32];
            word[..b.len()].copy_from_slice(b);
            B256::new(word)
        }
        TypedValue::Uint(v) => B256::new(v.to_be_bytes::<32>()),
        TypedValue::Int(v) => B256::new(v.into_raw().to_be_bytes::<32>()),
        TypedValue::Array(items) => {
            let mut buf = Vec::with_capacity(items.len() * 32);
            for item in items {
                buf.extend_from_slice(encode_word(schema, item)?.as_slice());
            }
            keccak256(&buf)
        }
        TypedValue::Struct(name, fields) => hash_struct(schema, name, fields)?,
    })
}

/// `hashStruct = keccak256(typeHash ∥ encodeData)`.
fn hash_struct(schema: &TypeSchema, name: &str, fields: &[(String, TypedValue)]) -> Result<B256> {
    let type_hash = keccak256(schema.encode_type(name)?.as_bytes());
    let mut preimage = Vec::with_capacity(32 + fields.len() * 32);
    preimage.extend_from_slice(type_hash.as_slice());
    for (_, value) in fields {
        preimage.extend_from_slice(encode_word(schema, value)?.as_slice());
    }
    Ok(keccak256(&preimage))
}

// =============================================================================
// TypedMessage
// =============================================================================

/// An immutable, validated structured-data message.
///
/// Validation, coercion, canonicalization and digesting all happen at
/// construction; a constructed message can neither fail to canonicalize
/// nor produce partial output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedMessage {
    schema: TypeSchema,
    primary_type: String,
    domain: Eip712Domain,
    canonical: String,
    digest: B256,
}

impl TypedMessage {
    pub fn new(
        schema: TypeSchema,
        primary_type: impl Into<String>,
        domain: Eip712Domain,
        message: Map<String, Value>,
    ) -> Result<Self> {
        let primary_type = primary_type.into();
        schema.validate()?;
        if schema.get(&primary_type).is_none() {
            return Err(CoreError::Schema(format!(
                "primary type `{primary_type}` is not declared"
            )));
        }

        let fields = coerce_struct(&schema, &primary_type, &message, "message")?;
        let struct_hash = hash_struct(&schema, &primary_type, &fields)?;
        let root = TypedValue::Struct(primary_type.clone(), fields);
        let canonical = render_canonical(&schema, &primary_type, &domain, &root);
        let digest = signing_hash(domain.separator(), struct_hash);

        Ok(Self {
            schema,
            primary_type,
            domain,
            canonical,
            digest,
        })
    }

    /// Strict parse of a typed-data JSON document
    /// (`{"types": ..., "primaryType": ..., "domain": ..., "message": ...}`).
    pub fn from_json(input: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawTypedData {
            types: BTreeMap<String, Vec<RawField>>,
            #[serde(rename = "primaryType")]
            primary_type: String,
            domain: Value,
            message: Value,
        }
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawField {
            name: String,
            #[serde(rename = "type")]
            kind: String,
        }

        let raw: RawTypedData = serde_json::from_str(input)
            .map_err(|e| CoreError::Canonicalization(format!("invalid typed-data JSON: {e}")))?;

        let domain = Eip712Domain::from_value(&raw.domain)?;

        let mut schema = TypeSchema::new();
        for (name, fields) in &raw.types {
            if name == DOMAIN_TYPE_NAME {
                continue;
            }
            let defs = fields
                .iter()
                .map(|f| FieldDef::new(f.name.clone(), &f.kind))
                .collect::<Result<Vec<_>>>()?;
            schema.define(name.clone(), defs)?;
        }

        // A declared EIP712Domain must agree with the domain fields that
        // are actually present; it is never silently rewritten.
        if let Some(declared) = raw.types.get(DOMAIN_TYPE_NAME) {
            let derived = domain.field_defs();
            let matches = declared.len() == derived.len()
                && declared
                    .iter()
                    .zip(&derived)
                    .all(|(d, (name, kind))| d.name == *name && d.kind == *kind);
            if !matches {
                return Err(CoreError::Schema(
                    "declared EIP712Domain does not match the domain fields present".into(),
                ));
            }
        }

        let Value::Object(message) = raw.message else {
            return Err(CoreError::Canonicalization(
                "message must be a JSON object".into(),
            ));
        };

        Self::new(schema, raw.primary_type, domain, message)
    }

    /// The canonical compact JSON of this message: the exact bytes that
    /// participate in concatenation and signing.
    pub fn canonical_json(&self) -> &str {
        &self.canonical
    }

    /// The EIP-712 signing hash of this message.
    pub fn digest(&self) -> B256 {
        self.digest
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }
}

/// `keccak256(0x19 0x01 ∥ domainSeparator ∥ structHash)`.
fn signing_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut preimage = Vec::with_capacity(2 + 64);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator.as_slice());
    preimage.extend_from_slice(struct_hash.as_slice());
    keccak256(&preimage)
}

fn render_canonical(
    schema: &TypeSchema,
    primary_type: &str,
    domain: &Eip712Domain,
    root: &TypedValue,
) -> String {
    // `types` entries sorted by name, with the domain type derived from
    // the domain descriptor itself.
    let mut types = BTreeMap::new();
    types.insert(
        DOMAIN_TYPE_NAME.to_string(),
        Value::Array(
            domain
                .field_defs()
                .into_iter()
                .map(|(name, kind)| field_entry(name, kind))
                .collect(),
        ),
    );
    for name in schema.type_names() {
        let fields = schema.get(name).unwrap_or_default();
        types.insert(
            name.to_string(),
            Value::Array(
                fields
                    .iter()
                    .map(|f| field_entry(&f.name, &f.kind.to_string()))
                    .collect(),
            ),
        );
    }
    let mut types_map = Map::new();
    for (name, entry) in types {
        types_map.insert(name, entry);
    }

    let mut doc = Map::new();
    doc.insert("types".into(), Value::Object(types_map));
    doc.insert(
        "primaryType".into(),
        Value::String(primary_type.to_string()),
    );
    doc.insert("domain".into(), domain.to_canonical_value());
    doc.insert("message".into(), canonical_value(root));
    Value::Object(doc).to_string()
}

fn field_entry(name: &str, kind: &str) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(name.to_string()));
    map.insert("type".into(), Value::String(kind.to_string()));
    Value::Object(map)
}
